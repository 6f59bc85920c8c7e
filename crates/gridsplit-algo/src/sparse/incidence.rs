//! Incidence-matrix helpers shared by assembly and island extraction.
//!
//! All matrices are built by triplet accumulation and compressed once, so
//! duplicate entries (parallel branches, a branch looped on one bus) sum.

use std::ops::Add;

use sprs::{CsMat, TriMat};

/// Compress `(row, col, value)` triplets into a CSR matrix, summing duplicates.
pub fn triplets_to_csr<N>(shape: (usize, usize), triplets: Vec<(usize, usize, N)>) -> CsMat<N>
where
    N: Clone + Add<Output = N>,
{
    let mut tri = TriMat::with_capacity(shape, triplets.len());
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csr()
}

/// Zero out the rows whose flag is false (`diag(active) · m`).
pub fn scale_rows(m: &CsMat<f64>, active: &[bool]) -> CsMat<f64> {
    let triplets = m
        .iter()
        .filter(|(_, (i, _))| active[*i])
        .map(|(&v, (i, j))| (i, j, v))
        .collect();
    triplets_to_csr(m.shape(), triplets)
}

/// Sub-matrix with the given rows and columns, renumbered in list order.
pub fn select<N>(m: &CsMat<N>, rows: &[usize], cols: &[usize]) -> CsMat<N>
where
    N: Clone + Add<Output = N>,
{
    let row_map = local_index(rows, m.rows());
    let col_map = local_index(cols, m.cols());
    let triplets = m
        .iter()
        .filter_map(|(v, (i, j))| match (row_map[i], col_map[j]) {
            (Some(li), Some(lj)) => Some((li, lj, v.clone())),
            _ => None,
        })
        .collect();
    triplets_to_csr((rows.len(), cols.len()), triplets)
}

/// Global-to-local lookup for an index subset.
pub fn local_index(subset: &[usize], len: usize) -> Vec<Option<usize>> {
    let mut map = vec![None; len];
    for (local, &global) in subset.iter().enumerate() {
        if global < len {
            map[global] = Some(local);
        }
    }
    map
}

/// Non-zero `(column, value)` pairs of every row.
#[derive(Debug, Clone)]
pub struct IncidenceRows {
    rows: Vec<Vec<(usize, f64)>>,
}

impl IncidenceRows {
    pub fn from_matrix(m: &CsMat<f64>) -> Self {
        let mut rows = vec![Vec::new(); m.rows()];
        for (&v, (i, j)) in m.iter() {
            if v != 0.0 {
                rows[i].push((j, v));
            }
        }
        Self { rows }
    }

    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        &self.rows[i]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Elements attached to each bus, read from a `buses x elements` incidence.
pub fn elements_by_bus(c_bus_elm: &CsMat<f64>) -> Vec<Vec<usize>> {
    let mut by_bus = vec![Vec::new(); c_bus_elm.rows()];
    for (&v, (bus, elm)) in c_bus_elm.iter() {
        if v != 0.0 {
            by_bus[bus].push(elm);
        }
    }
    by_bus
}
