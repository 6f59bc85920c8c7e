//! The calculation bundle handed to power-flow solvers.
//!
//! A [`CalculationInputs`] describes one solvable network: either the whole
//! network before partitioning (the "raw" bundle) or one island. Islands are
//! renumbered to contiguous local indices and keep an `original_*_idx` map
//! back to the whole network.

use chrono::NaiveDateTime;
use gridsplit_core::{ensure_indices, BusType, GridError, GridResult, Profile};
use num_complex::Complex64;
use sprs::CsMat;

use crate::sparse::{local_index, select, Admittances};

/// Matrices, injections and index maps of one network or island.
#[derive(Debug, Clone)]
pub struct CalculationInputs {
    pub n_bus: usize,
    pub n_br: usize,
    pub n_gen: usize,
    pub n_batt: usize,
    pub n_time: usize,
    /// Base power (MVA)
    pub sbase: f64,

    pub bus_names: Vec<String>,
    pub branch_names: Vec<String>,
    /// From-bus index per branch (local)
    pub f: Vec<usize>,
    /// To-bus index per branch (local)
    pub t: Vec<usize>,
    pub branch_rates: Vec<f64>,
    pub tap_mod: Vec<f64>,
    pub tap_ang: Vec<f64>,
    pub tap_f: Vec<f64>,
    pub tap_t: Vec<f64>,

    pub ybus: CsMat<Complex64>,
    pub yf: CsMat<Complex64>,
    pub yt: CsMat<Complex64>,
    pub yseries: CsMat<Complex64>,
    pub b1: CsMat<f64>,
    pub b2: CsMat<f64>,
    pub ys: Vec<Complex64>,
    pub gbc: Vec<Complex64>,
    pub cf: CsMat<f64>,
    pub ct: CsMat<f64>,
    /// `buses x generators`
    pub c_bus_gen: CsMat<f64>,
    /// `buses x batteries`
    pub c_bus_batt: CsMat<f64>,

    pub sbus: Vec<Complex64>,
    pub ibus: Vec<Complex64>,
    pub ysh: Vec<Complex64>,
    pub vbus: Vec<Complex64>,
    pub qmax: Vec<f64>,
    pub qmin: Vec<f64>,
    /// Installed generation capacity per bus (MVA)
    pub sinstalled: Vec<f64>,

    pub types: Vec<BusType>,
    pub pq: Vec<usize>,
    pub pv: Vec<usize>,
    pub slack: Vec<usize>,
    /// Sorted union of `pq` and `pv`
    pub pqpv: Vec<usize>,

    pub original_bus_idx: Vec<usize>,
    pub original_branch_idx: Vec<usize>,
    pub original_gen_idx: Vec<usize>,
    pub original_batt_idx: Vec<usize>,

    pub time_array: Vec<NaiveDateTime>,
    /// `[n_time, n_bus]`
    pub sbus_prof: Profile<Complex64>,
    pub ibus_prof: Profile<Complex64>,
    pub ysh_prof: Profile<Complex64>,
    /// `[n_time, n_br]`
    pub branch_rates_prof: Profile<f64>,
}

impl CalculationInputs {
    /// Empty bundle of the given size with identity index maps.
    pub fn new(n_bus: usize, n_br: usize, n_time: usize, n_gen: usize, n_batt: usize) -> Self {
        Self {
            n_bus,
            n_br,
            n_gen,
            n_batt,
            n_time,
            sbase: 100.0,
            bus_names: vec![String::new(); n_bus],
            branch_names: vec![String::new(); n_br],
            f: vec![0; n_br],
            t: vec![0; n_br],
            branch_rates: vec![0.0; n_br],
            tap_mod: vec![1.0; n_br],
            tap_ang: vec![0.0; n_br],
            tap_f: vec![1.0; n_br],
            tap_t: vec![1.0; n_br],
            ybus: CsMat::zero((n_bus, n_bus)),
            yf: CsMat::zero((n_br, n_bus)),
            yt: CsMat::zero((n_br, n_bus)),
            yseries: CsMat::zero((n_bus, n_bus)),
            b1: CsMat::zero((n_bus, n_bus)),
            b2: CsMat::zero((n_bus, n_bus)),
            ys: vec![Complex64::default(); n_br],
            gbc: vec![Complex64::default(); n_br],
            cf: CsMat::zero((n_br, n_bus)),
            ct: CsMat::zero((n_br, n_bus)),
            c_bus_gen: CsMat::zero((n_bus, n_gen)),
            c_bus_batt: CsMat::zero((n_bus, n_batt)),
            sbus: vec![Complex64::default(); n_bus],
            ibus: vec![Complex64::default(); n_bus],
            ysh: vec![Complex64::default(); n_bus],
            vbus: vec![Complex64::new(1.0, 0.0); n_bus],
            qmax: vec![0.0; n_bus],
            qmin: vec![0.0; n_bus],
            sinstalled: vec![0.0; n_bus],
            types: vec![BusType::PQ; n_bus],
            pq: Vec::new(),
            pv: Vec::new(),
            slack: Vec::new(),
            pqpv: Vec::new(),
            original_bus_idx: (0..n_bus).collect(),
            original_branch_idx: (0..n_br).collect(),
            original_gen_idx: (0..n_gen).collect(),
            original_batt_idx: (0..n_batt).collect(),
            time_array: vec![NaiveDateTime::default(); n_time],
            sbus_prof: Profile::new(n_time, n_bus),
            ibus_prof: Profile::new(n_time, n_bus),
            ysh_prof: Profile::new(n_time, n_bus),
            branch_rates_prof: Profile::new(n_time, n_br),
        }
    }

    /// Store the assembled matrices; returns `(C_bus_bus, C_branch_bus)` for partitioning.
    pub fn set_admittances(&mut self, adm: Admittances) -> (CsMat<f64>, CsMat<f64>) {
        self.ybus = adm.ybus;
        self.yf = adm.yf;
        self.yt = adm.yt;
        self.yseries = adm.yseries;
        self.b1 = adm.b1;
        self.b2 = adm.b2;
        self.ys = adm.ys;
        self.gbc = adm.gbc;
        self.cf = adm.cf;
        self.ct = adm.ct;
        (adm.c_bus_bus, adm.c_branch_bus)
    }

    /// Sub-bundle restricted to the given buses, branches, generators and batteries.
    ///
    /// Local indices follow the order of the given lists. Bus types are
    /// consolidated on the island.
    pub fn get_island(
        &self,
        bus_idx: &[usize],
        branch_idx: &[usize],
        gen_idx: &[usize],
        batt_idx: &[usize],
    ) -> GridResult<CalculationInputs> {
        ensure_indices("island bus", bus_idx, self.n_bus)?;
        ensure_indices("island branch", branch_idx, self.n_br)?;
        ensure_indices("island generator", gen_idx, self.n_gen)?;
        ensure_indices("island battery", batt_idx, self.n_batt)?;

        let bus_map = local_index(bus_idx, self.n_bus);
        let local_end = |k: usize, bus: usize| {
            bus_map[bus].ok_or_else(|| {
                GridError::Other(format!("branch {k} ends at bus {bus} outside the island"))
            })
        };
        let mut f = Vec::with_capacity(branch_idx.len());
        let mut t = Vec::with_capacity(branch_idx.len());
        for &k in branch_idx {
            f.push(local_end(k, self.f[k])?);
            t.push(local_end(k, self.t[k])?);
        }

        let mut island = CalculationInputs {
            n_bus: bus_idx.len(),
            n_br: branch_idx.len(),
            n_gen: gen_idx.len(),
            n_batt: batt_idx.len(),
            n_time: self.n_time,
            sbase: self.sbase,
            bus_names: pick(&self.bus_names, bus_idx),
            branch_names: pick(&self.branch_names, branch_idx),
            f,
            t,
            branch_rates: pick(&self.branch_rates, branch_idx),
            tap_mod: pick(&self.tap_mod, branch_idx),
            tap_ang: pick(&self.tap_ang, branch_idx),
            tap_f: pick(&self.tap_f, branch_idx),
            tap_t: pick(&self.tap_t, branch_idx),
            ybus: select(&self.ybus, bus_idx, bus_idx),
            yf: select(&self.yf, branch_idx, bus_idx),
            yt: select(&self.yt, branch_idx, bus_idx),
            yseries: select(&self.yseries, bus_idx, bus_idx),
            b1: select(&self.b1, bus_idx, bus_idx),
            b2: select(&self.b2, bus_idx, bus_idx),
            ys: pick(&self.ys, branch_idx),
            gbc: pick(&self.gbc, branch_idx),
            cf: select(&self.cf, branch_idx, bus_idx),
            ct: select(&self.ct, branch_idx, bus_idx),
            c_bus_gen: select(&self.c_bus_gen, bus_idx, gen_idx),
            c_bus_batt: select(&self.c_bus_batt, bus_idx, batt_idx),
            sbus: pick(&self.sbus, bus_idx),
            ibus: pick(&self.ibus, bus_idx),
            ysh: pick(&self.ysh, bus_idx),
            vbus: pick(&self.vbus, bus_idx),
            qmax: pick(&self.qmax, bus_idx),
            qmin: pick(&self.qmin, bus_idx),
            sinstalled: pick(&self.sinstalled, bus_idx),
            types: pick(&self.types, bus_idx),
            pq: Vec::new(),
            pv: Vec::new(),
            slack: Vec::new(),
            pqpv: Vec::new(),
            original_bus_idx: pick(&self.original_bus_idx, bus_idx),
            original_branch_idx: pick(&self.original_branch_idx, branch_idx),
            original_gen_idx: pick(&self.original_gen_idx, gen_idx),
            original_batt_idx: pick(&self.original_batt_idx, batt_idx),
            time_array: self.time_array.clone(),
            sbus_prof: self.sbus_prof.select_cols(bus_idx),
            ibus_prof: self.ibus_prof.select_cols(bus_idx),
            ysh_prof: self.ysh_prof.select_cols(bus_idx),
            branch_rates_prof: self.branch_rates_prof.select_cols(branch_idx),
        };
        island.consolidate();
        Ok(island)
    }

    /// Rebuild the `pq`/`pv`/`slack`/`pqpv` lists from `types`.
    ///
    /// Without a slack bus, the PV bus with the most installed generation is
    /// promoted (the first one on ties).
    pub fn consolidate(&mut self) {
        let of_type = |kind: BusType| -> Vec<usize> {
            self.types
                .iter()
                .enumerate()
                .filter(|&(_, &ty)| ty == kind)
                .map(|(i, _)| i)
                .collect()
        };
        self.pq = of_type(BusType::PQ);
        self.pv = of_type(BusType::PV);
        self.slack = of_type(BusType::Slack);

        if self.slack.is_empty() {
            let best = self.pv.iter().copied().fold(None, |best: Option<usize>, i| {
                match best {
                    Some(b) if self.sinstalled[b] >= self.sinstalled[i] => Some(b),
                    _ => Some(i),
                }
            });
            match best {
                Some(i) => {
                    self.types[i] = BusType::Slack;
                    self.pv.retain(|&j| j != i);
                    self.slack.push(i);
                    tracing::debug!(
                        bus = self.original_bus_idx.get(i).copied().unwrap_or(i),
                        "promoted PV bus to slack"
                    );
                }
                None => {
                    tracing::warn!(
                        n_bus = self.n_bus,
                        "island has no slack bus and no PV bus to promote"
                    );
                }
            }
        }

        let mut pqpv = Vec::with_capacity(self.pq.len() + self.pv.len());
        pqpv.extend_from_slice(&self.pq);
        pqpv.extend_from_slice(&self.pv);
        pqpv.sort_unstable();
        self.pqpv = pqpv;
    }

    /// Keep only the given time steps of every profile.
    pub fn trim_profiles(&mut self, time_idx: &[usize]) -> GridResult<()> {
        ensure_indices("time index", time_idx, self.n_time)?;
        self.time_array = pick(&self.time_array, time_idx);
        self.sbus_prof = self.sbus_prof.select_rows(time_idx);
        self.ibus_prof = self.ibus_prof.select_rows(time_idx);
        self.ysh_prof = self.ysh_prof.select_rows(time_idx);
        self.branch_rates_prof = self.branch_rates_prof.select_rows(time_idx);
        self.n_time = time_idx.len();
        Ok(())
    }
}

fn pick<T: Clone>(values: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| values[i].clone()).collect()
}
