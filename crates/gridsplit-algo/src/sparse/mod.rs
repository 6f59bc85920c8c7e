//! # Sparse Matrix Assembly
//!
//! Power grids are inherently sparse: a 10,000-bus network might have only
//! 15,000 branches. Every matrix here is stored in CSR form (`sprs`), built
//! once from triplets.
//!
//! ## Module Organization
//!
//! - [`admittance`]: Ybus, Yf, Yt, Yseries, B1, B2 and connectivity matrices
//! - [`incidence`]: triplet compression, row scaling and sub-matrix selection
//!
//! ## Usage
//!
//! ```ignore
//! use gridsplit_algo::sparse::{assemble, AssemblyInputs};
//!
//! let adm = assemble(&inputs)?;
//! println!("Ybus non-zeros: {}", adm.ybus.nnz());
//! ```

pub mod admittance;
pub mod incidence;

pub use admittance::{assemble, Admittances, AssemblyInputs, REACTANCE_EPSILON};
pub use incidence::{elements_by_bus, local_index, scale_rows, select, triplets_to_csr, IncidenceRows};
