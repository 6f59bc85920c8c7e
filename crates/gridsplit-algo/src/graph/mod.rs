//! Graph algorithms over the bus connectivity.
//!
//! - **Topology**: connected components ("islands") of the active buses and
//!   the branches inside each of them
//! - **Partitioning**: one self-contained calculation bundle per island
//!
//! ```ignore
//! use gridsplit_algo::graph::{IslandPartitioner, TopologyGraph};
//!
//! let graph = TopologyGraph::new(&c_bus_bus, &c_branch_bus, &bus_active)?;
//! let islands = IslandPartitioner::new(false).partition(raw, &graph, None)?;
//!
//! for island in &islands {
//!     println!("{} buses, {} branches", island.n_bus, island.n_br);
//! }
//! ```

pub mod islands;
pub mod topology;

pub use islands::IslandPartitioner;
pub use topology::TopologyGraph;
