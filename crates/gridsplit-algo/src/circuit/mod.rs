//! Network compilation: from an [`ElementStore`](gridsplit_core::ElementStore)
//! to per-island [`CalculationInputs`].
//!
//! - [`NumericalCircuit`]: owns the store and runs the pipeline, once for the
//!   static snapshot or once per distinct topology state of a time series
//! - [`CalculationInputs`]: the bundle a solver consumes
//! - [`group_states`]: deduplication of time steps by branch switching state

pub mod inputs;
pub mod numerical;
pub mod states;

pub use inputs::CalculationInputs;
pub use numerical::{reactive_power, NumericalCircuit, POWER_FACTOR_EPSILON};
pub use states::group_states;
