//! # gridsplit-core: Element Store and Shared Types
//!
//! Holds the flat, per-unit description of a power network that the
//! compilation pipeline in `gridsplit-algo` consumes.
//!
//! ## Data Layout
//!
//! The network is stored as a struct of arrays per element group:
//! - **Buses**: nominal voltage, limits, initial voltage, type
//! - **Branches**: from/to bus, series and shunt admittance data, taps, temperatures
//! - **Injections**: loads, generators, static generators, batteries, shunts
//!
//! Every time-varying attribute has a [`Profile`] of shape `[n_time, n_elements]`
//! next to its static array. Bus-incidence matrices are derived from the bus
//! index carried by each element, built as `sprs` CSR matrices.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridsplit_core::*;
//!
//! let counts = ElementCounts { bus: 2, branch: 1, load: 1, ..Default::default() };
//! let mut store = ElementStore::new(counts, 1, 100.0);
//! store.branch.f[0] = 0;
//! store.branch.t[0] = 1;
//! store.branch.x[0] = 0.1;
//! store.load.bus[0] = 1;
//! store.validate().unwrap();
//! ```
//!
//! ## Core Data Structures
//!
//! - [`ElementStore`] - All element groups plus the time axis
//! - [`Profile`] - Row-major time profile
//! - [`BusType`] - PQ / PV / Slack classification
//! - [`GridError`] - Unified error type

use serde::{Deserialize, Serialize};

pub mod elements;
pub mod error;
pub mod profile;
pub mod store;

pub use elements::{
    bus_incidence, element_incidence, BatteryData, BranchData, BusData, GeneratorData, LoadData,
    ShuntData, StaticGeneratorData,
};
pub use error::{ensure_indices, ensure_len, GridError, GridResult};
pub use profile::Profile;
pub use store::{ElementCounts, ElementStore};

/// Bus classification used by the power-flow formulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Fixed active and reactive injection
    #[default]
    PQ,
    /// Fixed active injection and voltage magnitude
    PV,
    /// Voltage reference (angle and magnitude fixed)
    Slack,
}

impl BusType {
    /// Integer code used by MATPOWER-style case files (1 = PQ, 2 = PV, 3 = slack).
    pub fn code(self) -> u8 {
        match self {
            BusType::PQ => 1,
            BusType::PV => 2,
            BusType::Slack => 3,
        }
    }
}
