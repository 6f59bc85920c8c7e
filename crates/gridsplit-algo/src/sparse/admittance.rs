//! Admittance and connectivity assembly.
//!
//! Every branch is a π model with an off-nominal complex tap and two virtual
//! taps (`tap_f`, `tap_t`) that absorb nominal-voltage mismatches:
//! ```text
//! Yff = (Ys + GBc/2) / (tap_f² · tap · conj(tap))    Yft = -Ys / (tap_f · tap_t · conj(tap))
//! Ytf = -Ys / (tap_t · tap_f · tap)                  Ytt = (Ys + GBc/2) / tap_t²
//!
//! Yf   = diag(Yff)·Cf + diag(Yft)·Ct
//! Yt   = diag(Ytf)·Cf + diag(Ytt)·Ct
//! Ybus = Cfᵗ·Yf + Ctᵗ·Yt + diag(Ysh)
//! ```
//!
//! `Yseries`, `B1` and `B2` reuse the same block structure with different
//! branch primitives. Products with the incidence matrices are expanded
//! branch by branch into triplets, then compressed once.

use std::ops::Mul;

use gridsplit_core::{ensure_len, GridError, GridResult};
use num_complex::Complex64;
use sprs::CsMat;

use super::incidence::{scale_rows, triplets_to_csr, IncidenceRows};
use crate::config::ImpedanceToleranceMode;

/// Added to the reactance before inverting it for `B1`/`B2`.
pub const REACTANCE_EPSILON: f64 = 1e-20;

/// Borrowed branch and bus data for one assembly.
///
/// Nothing here is mutated: resistance adjustments work on a private copy.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInputs<'a> {
    pub branch_active: &'a [bool],
    pub bus_active: &'a [bool],
    /// `branches x buses` from-side incidence, before states are applied
    pub cf0: &'a CsMat<f64>,
    /// `branches x buses` to-side incidence, before states are applied
    pub ct0: &'a CsMat<f64>,
    pub apply_temperature: bool,
    pub r: &'a [f64],
    pub r_corrected: &'a [f64],
    pub x: &'a [f64],
    pub g: &'a [f64],
    pub b: &'a [f64],
    pub tolerance_mode: ImpedanceToleranceMode,
    /// Impedance tolerance per branch (%)
    pub tolerance_pct: &'a [f64],
    pub tap_mod: &'a [f64],
    pub tap_ang: &'a [f64],
    pub tap_t: &'a [f64],
    pub tap_f: &'a [f64],
    /// Bus shunt admittance (p.u.)
    pub ysh: &'a [Complex64],
}

/// Output of [`assemble`].
#[derive(Debug, Clone)]
pub struct Admittances {
    pub ybus: CsMat<Complex64>,
    pub yf: CsMat<Complex64>,
    pub yt: CsMat<Complex64>,
    pub yseries: CsMat<Complex64>,
    pub b1: CsMat<f64>,
    pub b2: CsMat<f64>,
    /// Series admittance per branch
    pub ys: Vec<Complex64>,
    /// Shunt admittance `G + jB` per branch
    pub gbc: Vec<Complex64>,
    /// From-side incidence with branch states applied
    pub cf: CsMat<f64>,
    /// To-side incidence with branch states applied
    pub ct: CsMat<f64>,
    /// Bus-bus adjacency through active branches, rows of inactive buses empty
    pub c_bus_bus: CsMat<f64>,
    /// `Cf + Ct`
    pub c_branch_bus: CsMat<f64>,
}

impl AssemblyInputs<'_> {
    pub fn n_branch(&self) -> usize {
        self.cf0.rows()
    }

    pub fn n_bus(&self) -> usize {
        self.cf0.cols()
    }

    /// Fail on any array or matrix whose dimensions disagree with `Cf0`.
    pub fn validate(&self) -> GridResult<()> {
        let (n_br, n_bus) = self.cf0.shape();
        if self.ct0.shape() != (n_br, n_bus) {
            return Err(GridError::matrix_shape("Ct0", (n_br, n_bus), self.ct0.shape()));
        }
        ensure_len("branch_active", n_br, self.branch_active.len())?;
        for (what, v) in [
            ("R", self.r),
            ("R_corrected", self.r_corrected),
            ("X", self.x),
            ("G", self.g),
            ("B", self.b),
            ("impedance_tolerance", self.tolerance_pct),
            ("tap_mod", self.tap_mod),
            ("tap_ang", self.tap_ang),
            ("tap_t", self.tap_t),
            ("tap_f", self.tap_f),
        ] {
            ensure_len(what, n_br, v.len())?;
        }
        ensure_len("bus_active", n_bus, self.bus_active.len())?;
        ensure_len("Ysh", n_bus, self.ysh.len())
    }

    /// Resistance after temperature selection and tolerance scaling.
    pub fn effective_resistance(&self) -> Vec<f64> {
        let base = if self.apply_temperature {
            self.r_corrected
        } else {
            self.r
        };
        base.iter()
            .zip(self.tolerance_pct)
            .map(|(&r, &tol)| r * self.tolerance_mode.factor(tol))
            .collect()
    }

    /// Branch states after switching off every branch that touches an inactive bus.
    pub fn branch_in_service(&self) -> Vec<bool> {
        let cf0 = IncidenceRows::from_matrix(self.cf0);
        let ct0 = IncidenceRows::from_matrix(self.ct0);
        self.branch_active
            .iter()
            .enumerate()
            .map(|(k, &active)| {
                active
                    && cf0
                        .row(k)
                        .iter()
                        .chain(ct0.row(k))
                        .all(|&(bus, _)| self.bus_active[bus])
            })
            .collect()
    }

    /// Complex tap per branch; a zero modulus means nominal ratio.
    pub fn complex_taps(&self) -> Vec<Complex64> {
        self.tap_mod
            .iter()
            .zip(self.tap_ang)
            .map(|(&m, &a)| {
                let m = if m == 0.0 { 1.0 } else { m };
                Complex64::from_polar(m, a)
            })
            .collect()
    }
}

/// Per-branch entries of a 2x2 branch block.
struct BranchBlock<N> {
    ff: Vec<N>,
    ft: Vec<N>,
    tf: Vec<N>,
    tt: Vec<N>,
}

/// Triplets of the branch-side and bus-side matrices built from one block.
struct BlockTriplets<N> {
    from: Vec<(usize, usize, N)>,
    to: Vec<(usize, usize, N)>,
    bus: Vec<(usize, usize, N)>,
}

/// Expand `diag(ff)·Cf + diag(ft)·Ct`, `diag(tf)·Cf + diag(tt)·Ct` and
/// `Cfᵗ·(..) + Ctᵗ·(..)` into triplets.
fn expand_block<N>(cf: &IncidenceRows, ct: &IncidenceRows, block: &BranchBlock<N>) -> BlockTriplets<N>
where
    N: Copy + Mul<f64, Output = N>,
{
    let mut out = BlockTriplets {
        from: Vec::new(),
        to: Vec::new(),
        bus: Vec::new(),
    };
    for k in 0..cf.len() {
        let (ff, ft, tf, tt) = (block.ff[k], block.ft[k], block.tf[k], block.tt[k]);
        for &(j, c) in cf.row(k) {
            out.from.push((k, j, ff * c));
            out.to.push((k, j, tf * c));
        }
        for &(j, c) in ct.row(k) {
            out.from.push((k, j, ft * c));
            out.to.push((k, j, tt * c));
        }
        for &(i, a) in cf.row(k) {
            for &(j, c) in cf.row(k) {
                out.bus.push((i, j, ff * (a * c)));
            }
            for &(j, c) in ct.row(k) {
                out.bus.push((i, j, ft * (a * c)));
            }
        }
        for &(i, a) in ct.row(k) {
            for &(j, c) in cf.row(k) {
                out.bus.push((i, j, tf * (a * c)));
            }
            for &(j, c) in ct.row(k) {
                out.bus.push((i, j, tt * (a * c)));
            }
        }
    }
    out
}

/// Build every admittance and connectivity matrix for one set of branch and bus states.
pub fn assemble(inputs: &AssemblyInputs<'_>) -> GridResult<Admittances> {
    inputs.validate()?;
    let (n_br, n_bus) = inputs.cf0.shape();

    let in_service = inputs.branch_in_service();
    let cf = scale_rows(inputs.cf0, &in_service);
    let ct = scale_rows(inputs.ct0, &in_service);
    let cf_rows = IncidenceRows::from_matrix(&cf);
    let ct_rows = IncidenceRows::from_matrix(&ct);

    let r = inputs.effective_resistance();
    let tap = inputs.complex_taps();

    let ys: Vec<Complex64> = r
        .iter()
        .zip(inputs.x)
        .map(|(&r, &x)| Complex64::new(r, x).inv())
        .collect();
    let gbc: Vec<Complex64> = inputs
        .g
        .iter()
        .zip(inputs.b)
        .map(|(&g, &b)| Complex64::new(g, b))
        .collect();

    // Full π model
    let mut full = BranchBlock {
        ff: Vec::with_capacity(n_br),
        ft: Vec::with_capacity(n_br),
        tf: Vec::with_capacity(n_br),
        tt: Vec::with_capacity(n_br),
    };
    // Series elements only
    let mut series = BranchBlock {
        ff: Vec::with_capacity(n_br),
        ft: Vec::with_capacity(n_br),
        tf: Vec::with_capacity(n_br),
        tt: Vec::with_capacity(n_br),
    };
    for k in 0..n_br {
        let (tap_f, tap_t) = (inputs.tap_f[k], inputs.tap_t[k]);
        let tap2 = tap[k] * tap[k].conj();
        let y_half = ys[k] + gbc[k] / 2.0;

        full.tt.push(y_half / (tap_t * tap_t));
        full.ff.push(y_half / (tap2 * (tap_f * tap_f)));
        full.ft.push(-ys[k] / (tap[k].conj() * (tap_f * tap_t)));
        full.tf.push(-ys[k] / (tap[k] * (tap_t * tap_f)));

        series.tt.push(ys[k]);
        series.ff.push(ys[k] / tap2);
        series.ft.push(-ys[k] / tap[k].conj());
        series.tf.push(-ys[k] / tap[k]);
    }

    let y = expand_block(&cf_rows, &ct_rows, &full);
    let mut ybus_triplets = y.bus;
    ybus_triplets.extend(inputs.ysh.iter().enumerate().map(|(i, &v)| (i, i, v)));
    let ybus = triplets_to_csr((n_bus, n_bus), ybus_triplets);
    let yf = triplets_to_csr((n_br, n_bus), y.from);
    let yt = triplets_to_csr((n_br, n_bus), y.to);

    let yseries = triplets_to_csr(
        (n_bus, n_bus),
        expand_block(&cf_rows, &ct_rows, &series).bus,
    );

    // Fast decoupled
    let b1: Vec<f64> = inputs.x.iter().map(|&x| 1.0 / (x + REACTANCE_EPSILON)).collect();
    let b1_block = BranchBlock {
        ff: b1.clone(),
        ft: b1.iter().map(|&v| -v).collect(),
        tf: b1.iter().map(|&v| -v).collect(),
        tt: b1.clone(),
    };
    let b1_matrix = triplets_to_csr(
        (n_bus, n_bus),
        expand_block(&cf_rows, &ct_rows, &b1_block).bus,
    );

    let b2: Vec<f64> = b1.iter().zip(inputs.b).map(|(&b1, &b)| b1 + b).collect();
    let b2_block = BranchBlock {
        ff: (0..n_br)
            .map(|k| (Complex64::from(b2[k]) / (tap[k] * tap[k].conj())).re)
            .collect(),
        ft: (0..n_br)
            .map(|k| -(Complex64::from(b1[k]) / tap[k].conj()).re)
            .collect(),
        tf: (0..n_br)
            .map(|k| -(Complex64::from(b1[k]) / tap[k]).re)
            .collect(),
        tt: b2,
    };
    let b2_matrix = triplets_to_csr(
        (n_bus, n_bus),
        expand_block(&cf_rows, &ct_rows, &b2_block).bus,
    );

    // Connectivity
    let mut cbb_triplets = Vec::new();
    let mut adjacency = Vec::new();
    for k in 0..n_br {
        let ends: Vec<(usize, f64)> = cf_rows
            .row(k)
            .iter()
            .chain(ct_rows.row(k))
            .copied()
            .collect();
        cbb_triplets.extend(ends.iter().map(|&(j, v)| (k, j, v)));
        for &(i, a) in &ends {
            if !inputs.bus_active[i] {
                continue;
            }
            adjacency.extend(ends.iter().map(|&(j, c)| (i, j, a * c)));
        }
    }
    let c_branch_bus = triplets_to_csr((n_br, n_bus), cbb_triplets);
    let c_bus_bus = triplets_to_csr((n_bus, n_bus), adjacency);

    tracing::debug!(
        n_bus,
        n_branch = n_br,
        active_branches = in_service.iter().filter(|&&a| a).count(),
        ybus_nnz = ybus.nnz(),
        "assembled admittance matrices"
    );

    Ok(Admittances {
        ybus,
        yf,
        yt,
        yseries,
        b1: b1_matrix,
        b2: b2_matrix,
        ys,
        gbc,
        cf,
        ct,
        c_bus_bus,
        c_branch_bus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    struct Case {
        cf0: CsMat<f64>,
        ct0: CsMat<f64>,
        branch_active: Vec<bool>,
        bus_active: Vec<bool>,
        r: Vec<f64>,
        x: Vec<f64>,
        g: Vec<f64>,
        b: Vec<f64>,
        tol: Vec<f64>,
        tap_mod: Vec<f64>,
        tap_ang: Vec<f64>,
        ones: Vec<f64>,
        ysh: Vec<Complex64>,
    }

    impl Case {
        /// Two buses, one line 0-1 with R=0.01, X=0.1, B=0.02.
        fn two_bus() -> Self {
            Self {
                cf0: triplets_to_csr((1, 2), vec![(0, 0, 1.0)]),
                ct0: triplets_to_csr((1, 2), vec![(0, 1, 1.0)]),
                branch_active: vec![true],
                bus_active: vec![true, true],
                r: vec![0.01],
                x: vec![0.1],
                g: vec![0.0],
                b: vec![0.02],
                tol: vec![0.0],
                tap_mod: vec![1.0],
                tap_ang: vec![0.0],
                ones: vec![1.0],
                ysh: vec![Complex64::default(); 2],
            }
        }

        fn inputs(&self) -> AssemblyInputs<'_> {
            AssemblyInputs {
                branch_active: &self.branch_active,
                bus_active: &self.bus_active,
                cf0: &self.cf0,
                ct0: &self.ct0,
                apply_temperature: false,
                r: &self.r,
                r_corrected: &self.r,
                x: &self.x,
                g: &self.g,
                b: &self.b,
                tolerance_mode: ImpedanceToleranceMode::Specified,
                tolerance_pct: &self.tol,
                tap_mod: &self.tap_mod,
                tap_ang: &self.tap_ang,
                tap_t: &self.ones,
                tap_f: &self.ones,
                ysh: &self.ysh,
            }
        }
    }

    fn entry(m: &CsMat<Complex64>, i: usize, j: usize) -> Complex64 {
        m.get(i, j).copied().unwrap_or_default()
    }

    #[test]
    fn test_two_bus_ybus() {
        let case = Case::two_bus();
        let adm = assemble(&case.inputs()).unwrap();

        let ys = Complex64::new(0.01, 0.1).inv();
        let half_b = Complex64::new(0.0, 0.01);
        assert!((entry(&adm.ybus, 0, 0) - (ys + half_b)).norm() < TOL);
        assert!((entry(&adm.ybus, 1, 1) - (ys + half_b)).norm() < TOL);
        assert!((entry(&adm.ybus, 0, 1) + ys).norm() < TOL);
        assert!((entry(&adm.ybus, 1, 0) + ys).norm() < TOL);

        // Yseries has no charging
        assert!((entry(&adm.yseries, 0, 0) - ys).norm() < TOL);

        // Branch-side rows
        assert!((entry(&adm.yf, 0, 0) - (ys + half_b)).norm() < TOL);
        assert!((entry(&adm.yt, 0, 0) + ys).norm() < TOL);
    }

    #[test]
    fn test_shunt_on_diagonal() {
        let mut case = Case::two_bus();
        case.ysh[1] = Complex64::new(0.0, 0.5);
        let adm = assemble(&case.inputs()).unwrap();
        let base = assemble(&Case::two_bus().inputs()).unwrap();
        let diff = entry(&adm.ybus, 1, 1) - entry(&base.ybus, 1, 1);
        assert!((diff - Complex64::new(0.0, 0.5)).norm() < TOL);
    }

    #[test]
    fn test_tap_makes_ybus_asymmetric_in_value() {
        let mut case = Case::two_bus();
        case.tap_mod = vec![1.05];
        case.tap_ang = vec![0.1];
        let adm = assemble(&case.inputs()).unwrap();

        let ys = Complex64::new(0.01, 0.1).inv();
        let tap = Complex64::from_polar(1.05, 0.1);
        assert!((entry(&adm.ybus, 0, 1) + ys / tap.conj()).norm() < TOL);
        assert!((entry(&adm.ybus, 1, 0) + ys / tap).norm() < TOL);
        assert!(adm.ybus.get(0, 1).is_some() && adm.ybus.get(1, 0).is_some());
    }

    #[test]
    fn test_zero_tap_modulus_is_nominal() {
        let mut case = Case::two_bus();
        case.tap_mod = vec![0.0];
        let adm = assemble(&case.inputs()).unwrap();
        let nominal = assemble(&Case::two_bus().inputs()).unwrap();
        assert!((entry(&adm.ybus, 0, 1) - entry(&nominal.ybus, 0, 1)).norm() < TOL);
    }

    #[test]
    fn test_zero_reactance_b1_is_finite() {
        let mut case = Case::two_bus();
        case.r = vec![0.0];
        case.x = vec![0.0];
        let adm = assemble(&case.inputs()).unwrap();
        let b1 = adm.b1.get(0, 0).copied().unwrap_or_default();
        assert!(b1.is_finite());
        assert!((b1 - 1e20).abs() / 1e20 < 1e-12);
    }

    #[test]
    fn test_b1_b2_values() {
        let case = Case::two_bus();
        let adm = assemble(&case.inputs()).unwrap();
        let b1 = 1.0 / 0.1;
        assert!((adm.b1.get(0, 0).copied().unwrap_or_default() - b1).abs() < 1e-9);
        assert!((adm.b1.get(0, 1).copied().unwrap_or_default() + b1).abs() < 1e-9);
        assert!((adm.b2.get(0, 0).copied().unwrap_or_default() - (b1 + 0.02)).abs() < 1e-9);
        assert!((adm.b2.get(1, 1).copied().unwrap_or_default() - (b1 + 0.02)).abs() < 1e-9);
        assert!((adm.b2.get(0, 1).copied().unwrap_or_default() + b1).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_branch_contributes_nothing() {
        let mut case = Case::two_bus();
        case.branch_active = vec![false];
        let adm = assemble(&case.inputs()).unwrap();
        assert!(adm.ybus.get(0, 1).is_none());
        assert_eq!(adm.cf.nnz(), 0);
        assert_eq!(adm.c_branch_bus.nnz(), 0);
        // Series admittance is still reported
        assert!(adm.ys[0].norm() > 0.0);
    }

    #[test]
    fn test_lower_tolerance_scales_resistance() {
        let mut case = Case::two_bus();
        case.tol = vec![10.0];
        let mut inputs = case.inputs();
        inputs.tolerance_mode = ImpedanceToleranceMode::Lower;
        let adm = assemble(&inputs).unwrap();
        assert!((adm.ys[0] - Complex64::new(0.009, 0.1).inv()).norm() < TOL);
        // caller's resistance untouched
        assert_eq!(case.r, vec![0.01]);
    }

    #[test]
    fn test_branch_to_inactive_bus_is_out_of_service() {
        let mut case = Case::two_bus();
        case.bus_active = vec![true, false];
        let adm = assemble(&case.inputs()).unwrap();
        assert_eq!(case.inputs().branch_in_service(), vec![false]);
        assert!(adm.ybus.get(0, 1).is_none());
        // Only the bus shunt is left on the live bus
        assert_eq!(entry(&adm.ybus, 0, 0), Complex64::default());
        assert_eq!(adm.cf.nnz() + adm.ct.nnz(), 0);
        assert_eq!(adm.c_branch_bus.nnz(), 0);
        assert_eq!(adm.c_bus_bus.nnz(), 0);
    }

    #[test]
    fn test_ybus_matches_branch_matrices() {
        // Three buses, lines 0-1 and 1-2, bus 2 switched off
        let mut case = Case::two_bus();
        case.cf0 = triplets_to_csr((2, 3), vec![(0, 0, 1.0), (1, 1, 1.0)]);
        case.ct0 = triplets_to_csr((2, 3), vec![(0, 1, 1.0), (1, 2, 1.0)]);
        case.branch_active = vec![true, true];
        case.bus_active = vec![true, true, false];
        case.r = vec![0.01, 0.02];
        case.x = vec![0.1, 0.2];
        case.g = vec![0.0; 2];
        case.b = vec![0.02; 2];
        case.tol = vec![0.0; 2];
        case.tap_mod = vec![1.0; 2];
        case.tap_ang = vec![0.0; 2];
        case.ones = vec![1.0; 2];
        case.ysh = vec![Complex64::default(); 3];
        let adm = assemble(&case.inputs()).unwrap();

        // Ybus = Cfᵗ·Yf + Ctᵗ·Yt, rebuilt entry by entry
        for i in 0..3 {
            for j in 0..3 {
                let mut rebuilt = Complex64::default();
                for k in 0..2 {
                    let cf_ki = adm.cf.get(k, i).copied().unwrap_or_default();
                    let ct_ki = adm.ct.get(k, i).copied().unwrap_or_default();
                    rebuilt += entry(&adm.yf, k, j) * cf_ki + entry(&adm.yt, k, j) * ct_ki;
                }
                assert!((entry(&adm.ybus, i, j) - rebuilt).norm() < TOL, "entry ({i},{j})");
            }
        }
        assert!(adm.ybus.get(1, 2).is_none());
        let ys = Complex64::new(0.01, 0.1).inv();
        assert!((entry(&adm.ybus, 1, 1) - (ys + Complex64::new(0.0, 0.01))).norm() < TOL);
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let mut case = Case::two_bus();
        case.x = vec![0.1, 0.2];
        assert!(matches!(
            assemble(&case.inputs()),
            Err(GridError::Shape { .. })
        ));

        let mut case = Case::two_bus();
        case.ct0 = triplets_to_csr((1, 3), vec![(0, 2, 1.0)]);
        assert!(matches!(
            assemble(&case.inputs()),
            Err(GridError::Shape { .. })
        ));
    }
}
