//! # gridsplit-algo: Network Compilation for Power-Flow Solvers
//!
//! This crate turns the flat element arrays of a
//! [`gridsplit_core::ElementStore`] into the per-island calculation bundles a
//! power-flow solver needs.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Injections | [`circuit::NumericalCircuit`] | Sbus, Ibus, Ysh, Q limits per bus |
//! | Assembly | [`sparse::assemble`] | Ybus, Yf, Yt, Yseries, B1, B2 |
//! | Topology | [`graph::TopologyGraph`] | islands of active buses |
//! | Partitioning | [`graph::IslandPartitioner`] | one [`CalculationInputs`] per island |
//!
//! For time series, [`NumericalCircuit::compute_ts`] groups the time steps by
//! branch switching state and runs the pipeline once per group. Groups are
//! compiled in parallel when the `desktop` feature (rayon) is enabled.
//!
//! ## Example
//!
//! ```ignore
//! use gridsplit_algo::{CircuitConfig, NumericalCircuit};
//!
//! let config = CircuitConfig::load_from("circuit.toml")?;
//! let mut circuit = NumericalCircuit::new(store)?;
//!
//! for island in circuit.compute(&config)? {
//!     println!("{} buses, slack {:?}", island.n_bus, island.slack);
//! }
//! ```

pub mod circuit;
pub mod config;
pub mod graph;
pub mod sparse;

pub use circuit::{group_states, CalculationInputs, NumericalCircuit};
pub use config::{CircuitConfig, ImpedanceToleranceMode};
pub use graph::{IslandPartitioner, TopologyGraph};
pub use sparse::{assemble, Admittances, AssemblyInputs};

pub use gridsplit_core::{GridError, GridResult};
