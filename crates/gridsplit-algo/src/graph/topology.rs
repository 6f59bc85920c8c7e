//! Bus connectivity graph and island detection.

use gridsplit_core::{ensure_len, GridError, GridResult};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use sprs::CsMat;

/// Undirected bus graph implied by the non-zero pattern of `C_bus_bus`.
///
/// Node `i` of the graph is bus `i`. Only pairs of active buses are joined,
/// so inactive buses stay isolated and are left out of every island.
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    graph: UnGraph<(), ()>,
    bus_active: Vec<bool>,
    /// Branches touching each bus, from the rows of `C_branch_bus`
    bus_branches: Vec<Vec<usize>>,
    /// End buses of each branch
    branch_buses: Vec<Vec<usize>>,
}

impl TopologyGraph {
    /// Build from the bus-bus adjacency, the branch-bus incidence and the bus states.
    pub fn new(
        c_bus_bus: &CsMat<f64>,
        c_branch_bus: &CsMat<f64>,
        bus_active: &[bool],
    ) -> GridResult<Self> {
        let n_bus = bus_active.len();
        if c_bus_bus.shape() != (n_bus, n_bus) {
            return Err(GridError::matrix_shape(
                "C_bus_bus",
                (n_bus, n_bus),
                c_bus_bus.shape(),
            ));
        }
        ensure_len("C_branch_bus columns", n_bus, c_branch_bus.cols())?;

        let mut graph = UnGraph::with_capacity(n_bus, c_bus_bus.nnz() / 2);
        for _ in 0..n_bus {
            graph.add_node(());
        }
        for (&v, (i, j)) in c_bus_bus.iter() {
            // the pattern is symmetric, one edge per pair is enough
            if i < j && v != 0.0 && bus_active[i] && bus_active[j] {
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
            }
        }

        let mut bus_branches = vec![Vec::new(); n_bus];
        let mut branch_buses = vec![Vec::new(); c_branch_bus.rows()];
        for (&v, (k, j)) in c_branch_bus.iter() {
            if v != 0.0 {
                bus_branches[j].push(k);
                branch_buses[k].push(j);
            }
        }

        Ok(Self {
            graph,
            bus_active: bus_active.to_vec(),
            bus_branches,
            branch_buses,
        })
    }

    pub fn n_bus(&self) -> usize {
        self.bus_active.len()
    }

    /// Connected components over the active buses.
    ///
    /// Bus indices within an island are ascending; islands are ordered by
    /// their lowest bus index. Returns an empty list when no bus is active.
    pub fn find_islands(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.n_bus()];
        let mut islands = Vec::new();
        for start in 0..self.n_bus() {
            if visited[start] || !self.bus_active[start] {
                continue;
            }
            let mut members = Vec::new();
            let mut bfs = Bfs::new(&self.graph, NodeIndex::new(start));
            while let Some(node) = bfs.next(&self.graph) {
                visited[node.index()] = true;
                members.push(node.index());
            }
            members.sort_unstable();
            islands.push(members);
        }
        islands
    }

    /// Ascending indices of the branches whose end buses all lie in `island`.
    ///
    /// Inactive branches have empty `C_branch_bus` rows and never show up. A
    /// branch reaching an inactive bus is left out of the island as well.
    pub fn get_branches_of_the_island(&self, island: &[usize]) -> Vec<usize> {
        let mut in_island = vec![false; self.n_bus()];
        for &bus in island {
            if let Some(flag) = in_island.get_mut(bus) {
                *flag = true;
            }
        }
        let mut branches: Vec<usize> = island
            .iter()
            .filter_map(|&bus| self.bus_branches.get(bus))
            .flatten()
            .copied()
            .filter(|&k| self.branch_buses[k].iter().all(|&j| in_island[j]))
            .collect();
        branches.sort_unstable();
        branches.dedup();
        branches
    }
}
