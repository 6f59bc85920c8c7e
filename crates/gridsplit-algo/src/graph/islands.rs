//! Split a whole-network bundle into one bundle per island.

use gridsplit_core::GridResult;

use super::topology::TopologyGraph;
use crate::circuit::CalculationInputs;
use crate::sparse::elements_by_bus;

/// Turns the raw bundle and its topology into per-island bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct IslandPartitioner {
    /// Drop islands made of a single bus.
    pub ignore_single_node_islands: bool,
}

impl IslandPartitioner {
    pub fn new(ignore_single_node_islands: bool) -> Self {
        Self {
            ignore_single_node_islands,
        }
    }

    /// Partition `raw` along the islands of `graph`.
    ///
    /// When one island spans every bus, `raw` itself is consolidated and
    /// returned with identity index maps, even a one-bus network with
    /// `ignore_single_node_islands` set. Otherwise each island is extracted
    /// with [`CalculationInputs::get_island`]. With `time_idx`, the profiles of
    /// every returned bundle are trimmed to those steps. No active bus means
    /// no bundle.
    pub fn partition(
        &self,
        mut raw: CalculationInputs,
        graph: &TopologyGraph,
        time_idx: Option<&[usize]>,
    ) -> GridResult<Vec<CalculationInputs>> {
        let islands = graph.find_islands();

        if islands.len() == 1 && islands[0].len() == raw.n_bus {
            raw.consolidate();
            raw.original_bus_idx = (0..raw.n_bus).collect();
            raw.original_branch_idx = (0..raw.n_br).collect();
            if let Some(t_idx) = time_idx {
                raw.trim_profiles(t_idx)?;
            }
            tracing::debug!(n_bus = raw.n_bus, n_branch = raw.n_br, "single island");
            return Ok(vec![raw]);
        }

        let gens_by_bus = elements_by_bus(&raw.c_bus_gen);
        let batts_by_bus = elements_by_bus(&raw.c_bus_batt);

        let mut bundles = Vec::with_capacity(islands.len());
        for bus_idx in &islands {
            if self.skips(bus_idx) {
                tracing::debug!(bus = bus_idx.first().copied(), "skipping single-node island");
                continue;
            }
            let branch_idx = graph.get_branches_of_the_island(bus_idx);
            let gen_idx = attached(&gens_by_bus, bus_idx);
            let batt_idx = attached(&batts_by_bus, bus_idx);

            let mut island = raw.get_island(bus_idx, &branch_idx, &gen_idx, &batt_idx)?;
            if let Some(t_idx) = time_idx {
                island.trim_profiles(t_idx)?;
            }
            tracing::debug!(
                n_bus = island.n_bus,
                n_branch = island.n_br,
                n_gen = island.n_gen,
                n_batt = island.n_batt,
                "extracted island"
            );
            bundles.push(island);
        }

        tracing::info!(
            islands = islands.len(),
            kept = bundles.len(),
            "partitioned network"
        );
        Ok(bundles)
    }

    fn skips(&self, island: &[usize]) -> bool {
        self.ignore_single_node_islands && island.len() <= 1
    }
}

/// Sorted elements attached to any of the given buses.
fn attached(by_bus: &[Vec<usize>], buses: &[usize]) -> Vec<usize> {
    let mut idx: Vec<usize> = buses
        .iter()
        .flat_map(|&b| by_bus[b].iter().copied())
        .collect();
    idx.sort_unstable();
    idx.dedup();
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::triplets_to_csr;
    use gridsplit_core::BusType;

    /// Raw bundle with the given branches; every bus and branch active.
    fn raw(n_bus: usize, branches: &[(usize, usize)]) -> (CalculationInputs, TopologyGraph) {
        let n_br = branches.len();
        let mut c = CalculationInputs::new(n_bus, n_br, 2, 1, 0);
        let mut cbb = Vec::new();
        let mut adj = Vec::new();
        for (k, &(f, t)) in branches.iter().enumerate() {
            c.f[k] = f;
            c.t[k] = t;
            cbb.push((k, f, 1.0));
            cbb.push((k, t, 1.0));
            for &i in &[f, t] {
                for &j in &[f, t] {
                    adj.push((i, j, 1.0));
                }
            }
        }
        c.c_bus_gen = triplets_to_csr((n_bus, 1), vec![(n_bus - 1, 0, 1.0)]);
        c.types[n_bus - 1] = BusType::PV;
        let graph = TopologyGraph::new(
            &triplets_to_csr((n_bus, n_bus), adj),
            &triplets_to_csr((n_br, n_bus), cbb),
            &vec![true; n_bus],
        )
        .unwrap();
        (c, graph)
    }

    #[test]
    fn test_single_island_returns_raw() {
        let (c, g) = raw(3, &[(0, 1), (1, 2)]);
        let out = IslandPartitioner::default().partition(c, &g, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].original_bus_idx, vec![0, 1, 2]);
        assert_eq!(out[0].slack, vec![2]);
    }

    #[test]
    fn test_two_islands_with_generator() {
        let (c, g) = raw(4, &[(0, 1), (2, 3)]);
        let out = IslandPartitioner::default()
            .partition(c, &g, Some(&[1][..]))
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].original_bus_idx, vec![0, 1]);
        assert_eq!(out[0].n_gen, 0);
        assert_eq!(out[1].original_bus_idx, vec![2, 3]);
        assert_eq!(out[1].original_branch_idx, vec![1]);
        assert_eq!(out[1].original_gen_idx, vec![0]);
        assert_eq!(out[1].n_time, 1);
    }

    #[test]
    fn test_lone_bus_network_is_never_skipped() {
        let mut c = CalculationInputs::new(1, 0, 1, 0, 0);
        c.types[0] = BusType::Slack;
        let graph = TopologyGraph::new(
            &triplets_to_csr((1, 1), Vec::new()),
            &triplets_to_csr((0, 1), Vec::new()),
            &[true],
        )
        .unwrap();
        let out = IslandPartitioner::new(true).partition(c, &graph, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].slack, vec![0]);
    }

    #[test]
    fn test_ignore_single_node_islands() {
        let (c, g) = raw(3, &[(0, 1)]);
        let out = IslandPartitioner::new(true).partition(c.clone(), &g, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].original_bus_idx, vec![0, 1]);

        let out = IslandPartitioner::new(false).partition(c, &g, None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].original_bus_idx, vec![2]);
    }
}
