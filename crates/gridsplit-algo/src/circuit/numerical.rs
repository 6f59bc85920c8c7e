//! The orchestrator: injections, assembly and partitioning over an [`ElementStore`].

use std::collections::BTreeMap;
use std::ops::{AddAssign, Mul};

use gridsplit_core::{BusType, ElementStore, GridError, GridResult, Profile};
use num_complex::Complex64;
use sprs::CsMat;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::inputs::CalculationInputs;
use super::states::group_states;
use crate::config::{CircuitConfig, ImpedanceToleranceMode};
use crate::graph::{IslandPartitioner, TopologyGraph};
use crate::sparse::{assemble, AssemblyInputs};

/// Added to the squared power factor when back-deriving reactive power.
pub const POWER_FACTOR_EPSILON: f64 = 1e-20;

/// Reactive power of a controlled generator from its active power and power factor.
///
/// `Q = sign(pf) · P · sqrt((1 - pf²) / pf²)`, finite for `pf = 0`.
pub fn reactive_power(p: f64, pf: f64) -> f64 {
    let sign = (pf + POWER_FACTOR_EPSILON).signum();
    let pf2 = pf * pf;
    sign * p * ((1.0 - pf2) / (pf2 + POWER_FACTOR_EPSILON)).sqrt()
}

/// `C · values` for a `buses x elements` incidence.
fn scatter<T>(c_bus_elm: &CsMat<f64>, values: &[T]) -> Vec<T>
where
    T: Copy + Default + AddAssign + Mul<f64, Output = T>,
{
    let mut out = vec![T::default(); c_bus_elm.rows()];
    for (&c, (bus, k)) in c_bus_elm.iter() {
        out[bus] += values[k] * c;
    }
    out
}

/// `values` where active, zero elsewhere, divided by `sbase`.
fn per_unit_active<T>(values: &[T], active: &[bool], sbase: f64) -> Vec<T>
where
    T: Copy + Default + Mul<f64, Output = T>,
{
    values
        .iter()
        .zip(active)
        .map(|(&v, &on)| if on { v * (1.0 / sbase) } else { T::default() })
        .collect()
}

/// Incidence matrices derived from the element bus indices.
struct Incidences {
    cf0: CsMat<f64>,
    ct0: CsMat<f64>,
    load: CsMat<f64>,
    generator: CsMat<f64>,
    static_generator: CsMat<f64>,
    battery: CsMat<f64>,
    shunt: CsMat<f64>,
}

impl Incidences {
    fn new(store: &ElementStore) -> GridResult<Self> {
        let n_bus = store.n_bus();
        Ok(Self {
            cf0: store.branch.from_incidence(n_bus)?,
            ct0: store.branch.to_incidence(n_bus)?,
            load: store.load.incidence(n_bus)?,
            generator: store.generator.incidence(n_bus)?,
            static_generator: store.static_generator.incidence(n_bus)?,
            battery: store.battery.incidence(n_bus)?,
            shunt: store.shunt.incidence(n_bus)?,
        })
    }
}

/// Per-call data shared by every topology state.
struct Pipeline<'a> {
    store: &'a ElementStore,
    inc: Incidences,
    tolerance_pct: Vec<f64>,
    tolerance_mode: ImpedanceToleranceMode,
    apply_temperature: bool,
    partitioner: IslandPartitioner,
}

impl Pipeline<'_> {
    /// Assemble, detect islands and partition one state of the network.
    fn run(
        &self,
        mut raw: CalculationInputs,
        branch_active: &[bool],
        bus_active: &[bool],
        r_corrected: &[f64],
        ysh: &[Complex64],
        time_idx: Option<&[usize]>,
    ) -> GridResult<Vec<CalculationInputs>> {
        let br = &self.store.branch;
        let adm = assemble(&AssemblyInputs {
            branch_active,
            bus_active,
            cf0: &self.inc.cf0,
            ct0: &self.inc.ct0,
            apply_temperature: self.apply_temperature,
            r: &br.r,
            r_corrected,
            x: &br.x,
            g: &br.g,
            b: &br.b,
            tolerance_mode: self.tolerance_mode,
            tolerance_pct: &self.tolerance_pct,
            tap_mod: &br.tap_mod,
            tap_ang: &br.tap_ang,
            tap_t: &br.tap_t,
            tap_f: &br.tap_f,
            ysh,
        })?;
        let (c_bus_bus, c_branch_bus) = raw.set_admittances(adm);
        let graph = TopologyGraph::new(&c_bus_bus, &c_branch_bus, bus_active)?;
        self.partitioner.partition(raw, &graph, time_idx)
    }
}

/// Owns the element store and compiles it into per-island calculation bundles.
#[derive(Debug, Clone)]
pub struct NumericalCircuit {
    store: ElementStore,
}

impl NumericalCircuit {
    /// Wrap a populated store after checking its shapes and bus references.
    pub fn new(store: ElementStore) -> GridResult<Self> {
        store.validate()?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    /// Mutable access for profile maintenance ([`ElementStore::re_index_time`] and friends).
    pub fn store_mut(&mut self) -> &mut ElementStore {
        &mut self.store
    }

    pub fn into_store(self) -> ElementStore {
        self.store
    }

    pub fn n_time(&self) -> usize {
        self.store.n_time
    }

    /// Bus types as last written back by [`compute`](Self::compute) or [`compute_ts`](Self::compute_ts).
    pub fn bus_types(&self) -> &[BusType] {
        &self.store.bus.types
    }

    /// Per-unit complex injection of every bus at every time step, indexed `[bus][t]`.
    ///
    /// Loads subtract, generators, batteries and static generators add.
    /// Active flags are not applied.
    pub fn get_power_injections(&self) -> GridResult<Vec<Vec<Complex64>>> {
        self.store.validate()?;
        let inc = Incidences::new(&self.store)?;
        let s = &self.store;
        let scale = 1.0 / s.sbase;

        let mut out = vec![Vec::with_capacity(s.n_time); s.n_bus()];
        for t in 0..s.n_time {
            let load = scatter(&inc.load, s.load.power_prof.row(t));
            let gen_p: Vec<Complex64> = s
                .generator
                .power_prof
                .row(t)
                .iter()
                .map(|&p| Complex64::new(p, 0.0))
                .collect();
            let batt_p: Vec<Complex64> = s
                .battery
                .power_prof
                .row(t)
                .iter()
                .map(|&p| Complex64::new(p, 0.0))
                .collect();
            let gen = scatter(&inc.generator, &gen_p);
            let batt = scatter(&inc.battery, &batt_p);
            let sta = scatter(&inc.static_generator, s.static_generator.power_prof.row(t));
            for (bus, column) in out.iter_mut().enumerate() {
                column.push((gen[bus] + batt[bus] + sta[bus] - load[bus]) * scale);
            }
        }
        Ok(out)
    }

    /// Whole-network bundle before assembly and partitioning.
    ///
    /// Holds the per-unit injections (`Sbus`, `Ibus`, `Ysh`), reactive limits
    /// and installed capacity per bus, plus their time profiles evaluated
    /// with each step's active flags.
    pub fn get_raw_circuit(
        &self,
        add_generation: bool,
        add_storage: bool,
    ) -> GridResult<CalculationInputs> {
        self.store.validate()?;
        let inc = Incidences::new(&self.store)?;
        self.raw_circuit(&inc, add_generation, add_storage)
    }

    fn raw_circuit(
        &self,
        inc: &Incidences,
        add_generation: bool,
        add_storage: bool,
    ) -> GridResult<CalculationInputs> {
        let s = &self.store;
        let sbase = s.sbase;
        let (n_bus, n_br, n_time) = (s.n_bus(), s.n_branch(), s.n_time);
        let mut c = CalculationInputs::new(n_bus, n_br, n_time, s.generator.len(), s.battery.len());

        c.sbase = sbase;
        c.bus_names = s.bus.names.clone();
        c.branch_names = s.branch.names.clone();
        c.f = s.branch.f.clone();
        c.t = s.branch.t.clone();
        c.branch_rates = s.branch.rates.clone();
        c.branch_rates_prof = s.branch.rates_prof.clone();
        c.tap_mod = s.branch.tap_mod.clone();
        c.tap_ang = s.branch.tap_ang.clone();
        c.tap_f = s.branch.tap_f.clone();
        c.tap_t = s.branch.tap_t.clone();
        c.c_bus_gen = inc.generator.clone();
        c.c_bus_batt = inc.battery.clone();
        c.vbus = s.bus.v0.clone();
        c.types = s.bus.types.clone();
        c.time_array = s.time_array.clone();

        let snapshot = Snapshot {
            load_active: &s.load.active,
            load_power: &s.load.power,
            load_current: &s.load.current,
            load_admittance: &s.load.admittance,
            shunt_active: &s.shunt.active,
            shunt_admittance: &s.shunt.admittance,
            sta_active: &s.static_generator.active,
            sta_power: &s.static_generator.power,
            gen_active: &s.generator.active,
            gen_power: &s.generator.power,
            gen_pf: &s.generator.power_factor,
            batt_active: &s.battery.active,
            batt_power: &s.battery.power,
        };
        let inj = snapshot.injections(inc, sbase, add_generation, add_storage);
        c.sbus = inj.sbus;
        c.ibus = inj.ibus;
        c.ysh = inj.ysh;

        let gen_nominal = per_unit_active(&s.generator.nominal_power, &s.generator.active, 1.0);
        c.sinstalled = scatter(&inc.generator, &gen_nominal);

        let limits = |gen: &[f64], batt: &[f64]| -> Vec<f64> {
            let g: Vec<f64> = gen.iter().map(|&q| q / sbase).collect();
            let b: Vec<f64> = batt.iter().map(|&q| q / sbase).collect();
            scatter(&inc.generator, &g)
                .into_iter()
                .zip(scatter(&inc.battery, &b))
                .map(|(g, b)| g + b)
                .collect()
        };
        c.qmax = limits(&s.generator.qmax, &s.battery.qmax);
        c.qmin = limits(&s.generator.qmin, &s.battery.qmin);

        let mut sbus_rows = Vec::with_capacity(n_time);
        let mut ibus_rows = Vec::with_capacity(n_time);
        let mut ysh_rows = Vec::with_capacity(n_time);
        for t in 0..n_time {
            let step = Snapshot {
                load_active: s.load.active_prof.row(t),
                load_power: s.load.power_prof.row(t),
                load_current: s.load.current_prof.row(t),
                load_admittance: s.load.admittance_prof.row(t),
                shunt_active: s.shunt.active_prof.row(t),
                shunt_admittance: s.shunt.admittance_prof.row(t),
                sta_active: s.static_generator.active_prof.row(t),
                sta_power: s.static_generator.power_prof.row(t),
                gen_active: s.generator.active_prof.row(t),
                gen_power: s.generator.power_prof.row(t),
                gen_pf: s.generator.power_factor_prof.row(t),
                batt_active: s.battery.active_prof.row(t),
                batt_power: s.battery.power_prof.row(t),
            };
            let inj = step.injections(inc, sbase, add_generation, add_storage);
            sbus_rows.push(inj.sbus);
            ibus_rows.push(inj.ibus);
            ysh_rows.push(inj.ysh);
        }
        if n_time > 0 {
            c.sbus_prof = Profile::from_rows(sbus_rows)?;
            c.ibus_prof = Profile::from_rows(ibus_rows)?;
            c.ysh_prof = Profile::from_rows(ysh_rows)?;
        }
        Ok(c)
    }

    /// Temperature-corrected resistance `R·(1 + α·(T_oper − T_base))`.
    ///
    /// Uses the static operating temperature for `None`, else step `t` of its profile.
    pub fn r_corrected(&self, t: Option<usize>) -> GridResult<Vec<f64>> {
        let br = &self.store.branch;
        let temp_oper = match t {
            None => &br.temp_oper[..],
            Some(t) if t < self.store.n_time => br.temp_oper_prof.row(t),
            Some(t) => {
                return Err(GridError::IndexOutOfRange {
                    what: "time index".to_string(),
                    index: t,
                    len: self.store.n_time,
                })
            }
        };
        Ok(br
            .r
            .iter()
            .zip(&br.alpha)
            .zip(temp_oper.iter().zip(&br.temp_base))
            .map(|((&r, &alpha), (&oper, &base))| r * (1.0 + alpha * (oper - base)))
            .collect())
    }

    /// Imaginary part of the static-state Ybus, without tolerance adjustment.
    pub fn get_b(&self, apply_temperature: bool) -> GridResult<CsMat<f64>> {
        self.store.validate()?;
        let s = &self.store;
        let inc = Incidences::new(s)?;
        let r_corrected = self.r_corrected(None)?;

        let mut ysh = scatter(
            &inc.shunt,
            &per_unit_active(&s.shunt.admittance, &s.shunt.active, s.sbase),
        );
        let load_ysh = scatter(
            &inc.load,
            &per_unit_active(&s.load.admittance, &s.load.active, s.sbase),
        );
        for (y, l) in ysh.iter_mut().zip(load_ysh) {
            *y += l;
        }

        let no_tolerance = vec![0.0; s.n_branch()];
        let br = &s.branch;
        let adm = assemble(&AssemblyInputs {
            branch_active: &br.active,
            bus_active: &s.bus.active,
            cf0: &inc.cf0,
            ct0: &inc.ct0,
            apply_temperature,
            r: &br.r,
            r_corrected: &r_corrected,
            x: &br.x,
            g: &br.g,
            b: &br.b,
            tolerance_mode: ImpedanceToleranceMode::Specified,
            tolerance_pct: &no_tolerance,
            tap_mod: &br.tap_mod,
            tap_ang: &br.tap_ang,
            tap_t: &br.tap_t,
            tap_f: &br.tap_f,
            ysh: &ysh,
        })?;
        Ok(adm.ybus.map(|v| v.im))
    }

    /// Group time steps with identical branch states, keyed by the first step of each group.
    pub fn get_different_states(&self) -> BTreeMap<usize, Vec<usize>> {
        group_states(&self.store.branch.active_prof)
    }

    fn pipeline(&self, inc: Incidences, config: &CircuitConfig) -> Pipeline<'_> {
        let n_br = self.store.n_branch();
        let tolerance_pct = match config.impedance_tolerance {
            Some(pct) => vec![pct; n_br],
            None => self.store.branch.impedance_tolerance.clone(),
        };
        Pipeline {
            store: &self.store,
            inc,
            tolerance_pct,
            tolerance_mode: config.branch_tolerance_mode,
            apply_temperature: config.apply_temperature,
            partitioner: IslandPartitioner::new(config.ignore_single_node_islands),
        }
    }

    /// Compile the static snapshot into per-island bundles.
    ///
    /// Bus types computed on the islands are written back into the store.
    pub fn compute(&mut self, config: &CircuitConfig) -> GridResult<Vec<CalculationInputs>> {
        self.store.validate()?;
        let inc = Incidences::new(&self.store)?;
        let raw = self.raw_circuit(&inc, config.add_generation, config.add_storage)?;
        let r_corrected = self.r_corrected(None)?;
        let ysh = raw.ysh.clone();

        let pipeline = self.pipeline(inc, config);
        let islands = pipeline.run(
            raw,
            &self.store.branch.active,
            &self.store.bus.active,
            &r_corrected,
            &ysh,
            None,
        )?;
        self.write_back_bus_types(&islands);
        Ok(islands)
    }

    /// Compile every distinct topology state of the time series.
    ///
    /// The pipeline runs once per group from [`get_different_states`](Self::get_different_states),
    /// using the representative step's branch and bus states, temperatures and
    /// shunt admittances; the bundles' profiles are trimmed to the group's
    /// steps. Only the group holding step 0 writes bus types back.
    pub fn compute_ts(
        &mut self,
        config: &CircuitConfig,
    ) -> GridResult<BTreeMap<usize, Vec<CalculationInputs>>> {
        self.store.validate()?;
        let states = self.get_different_states();
        tracing::info!(
            n_time = self.store.n_time,
            n_states = states.len(),
            "distinct topology states"
        );

        let inc = Incidences::new(&self.store)?;
        let raw = self.raw_circuit(&inc, config.add_generation, config.add_storage)?;
        let pipeline = self.pipeline(inc, config);

        type Compiled = (usize, Vec<CalculationInputs>);
        let run_state = |(&t, t_idx): (&usize, &Vec<usize>)| -> GridResult<Compiled> {
            let r_corrected = self.r_corrected(Some(t))?;
            let islands = pipeline.run(
                raw.clone(),
                self.store.branch.active_prof.row(t),
                self.store.bus.active_prof.row(t),
                &r_corrected,
                raw.ysh_prof.row(t),
                Some(t_idx),
            )?;
            tracing::debug!(
                state = t,
                steps = t_idx.len(),
                islands = islands.len(),
                "compiled state"
            );
            Ok((t, islands))
        };

        #[cfg(feature = "rayon")]
        let compiled: GridResult<Vec<_>> = if config.parallel {
            states.par_iter().map(run_state).collect()
        } else {
            states.iter().map(run_state).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let compiled: GridResult<Vec<_>> = states.iter().map(run_state).collect();

        let collection: BTreeMap<usize, Vec<CalculationInputs>> = compiled?.into_iter().collect();

        if let Some(first) = collection.get(&0) {
            self.write_back_bus_types(first);
        }
        Ok(collection)
    }

    /// Scatter island bus types into the store through `original_bus_idx`.
    fn write_back_bus_types(&mut self, islands: &[CalculationInputs]) {
        for island in islands {
            for (&global, &ty) in island.original_bus_idx.iter().zip(&island.types) {
                self.store.bus.types[global] = ty;
            }
        }
    }
}

/// Per-unit injections of one bus state.
struct Injections {
    sbus: Vec<Complex64>,
    ibus: Vec<Complex64>,
    ysh: Vec<Complex64>,
}

/// Element values and active flags for one evaluation (static or one time step).
struct Snapshot<'a> {
    load_active: &'a [bool],
    load_power: &'a [Complex64],
    load_current: &'a [Complex64],
    load_admittance: &'a [Complex64],
    shunt_active: &'a [bool],
    shunt_admittance: &'a [Complex64],
    sta_active: &'a [bool],
    sta_power: &'a [Complex64],
    gen_active: &'a [bool],
    gen_power: &'a [f64],
    gen_pf: &'a [f64],
    batt_active: &'a [bool],
    batt_power: &'a [f64],
}

impl Snapshot<'_> {
    fn injections(
        &self,
        inc: &Incidences,
        sbase: f64,
        add_generation: bool,
        add_storage: bool,
    ) -> Injections {
        let neg = |v: &[Complex64]| -> Vec<Complex64> { v.iter().map(|&x| -x).collect() };

        let mut ysh = scatter(
            &inc.shunt,
            &per_unit_active(self.shunt_admittance, self.shunt_active, sbase),
        );
        add_into(
            &mut ysh,
            scatter(
                &inc.load,
                &per_unit_active(self.load_admittance, self.load_active, sbase),
            ),
        );

        let mut sbus = scatter(
            &inc.load,
            &per_unit_active(&neg(self.load_power), self.load_active, sbase),
        );
        let ibus = scatter(
            &inc.load,
            &per_unit_active(&neg(self.load_current), self.load_active, sbase),
        );

        if add_generation {
            add_into(
                &mut sbus,
                scatter(
                    &inc.static_generator,
                    &per_unit_active(self.sta_power, self.sta_active, sbase),
                ),
            );
            let gen_s: Vec<Complex64> = self
                .gen_power
                .iter()
                .zip(self.gen_pf)
                .map(|(&p, &pf)| Complex64::new(p, reactive_power(p, pf)))
                .collect();
            add_into(
                &mut sbus,
                scatter(
                    &inc.generator,
                    &per_unit_active(&gen_s, self.gen_active, sbase),
                ),
            );
        }
        if add_storage {
            let batt_s: Vec<Complex64> = self
                .batt_power
                .iter()
                .map(|&p| Complex64::new(p, 0.0))
                .collect();
            add_into(
                &mut sbus,
                scatter(
                    &inc.battery,
                    &per_unit_active(&batt_s, self.batt_active, sbase),
                ),
            );
        }

        Injections { sbus, ibus, ysh }
    }
}

fn add_into(acc: &mut [Complex64], other: Vec<Complex64>) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsplit_core::ElementCounts;

    fn two_bus_store() -> ElementStore {
        let counts = ElementCounts {
            bus: 2,
            branch: 1,
            load: 1,
            generator: 1,
            ..ElementCounts::default()
        };
        let mut s = ElementStore::new(counts, 2, 100.0);
        s.branch.f = vec![0];
        s.branch.t = vec![1];
        s.branch.r = vec![0.01];
        s.branch.x = vec![0.1];
        s.load.bus = vec![1];
        s.load.power = vec![Complex64::new(10.0, 5.0)];
        s.generator.bus = vec![0];
        s.generator.power = vec![20.0];
        s.generator.power_factor = vec![1.0];
        s.generator.nominal_power = vec![50.0];
        s.generator.qmax = vec![30.0];
        s.generator.qmin = vec![-30.0];
        s.bus.types = vec![BusType::PV, BusType::PQ];
        s
    }

    #[test]
    fn test_reactive_power_sign_and_guard() {
        assert!((reactive_power(10.0, 0.8) - 7.5).abs() < 1e-12);
        assert!((reactive_power(10.0, -0.8) + 7.5).abs() < 1e-12);
        assert!(reactive_power(10.0, 1.0).abs() < 1e-12);
        assert!(reactive_power(10.0, 0.0).is_finite());
    }

    #[test]
    fn test_raw_circuit_injections() {
        let circuit = NumericalCircuit::new(two_bus_store()).unwrap();
        let raw = circuit.get_raw_circuit(true, true).unwrap();
        assert!((raw.sbus[1] - Complex64::new(-0.1, -0.05)).norm() < 1e-12);
        assert!((raw.sbus[0] - Complex64::new(0.2, 0.0)).norm() < 1e-12);
        assert_eq!(raw.sinstalled, vec![50.0, 0.0]);
        assert!((raw.qmax[0] - 0.3).abs() < 1e-12);
        assert!((raw.qmin[0] + 0.3).abs() < 1e-12);

        let no_gen = circuit.get_raw_circuit(false, true).unwrap();
        assert_eq!(no_gen.sbus[0], Complex64::default());
    }

    #[test]
    fn test_inactive_load_is_dropped() {
        let mut store = two_bus_store();
        store.load.active = vec![false];
        let raw = NumericalCircuit::new(store).unwrap().get_raw_circuit(true, true).unwrap();
        assert_eq!(raw.sbus[1], Complex64::default());
    }

    #[test]
    fn test_r_corrected() {
        let mut store = two_bus_store();
        store.branch.alpha = vec![0.004];
        store.branch.temp_base = vec![20.0];
        store.branch.temp_oper = vec![70.0];
        store.branch.temp_oper_prof.set(1, 0, 45.0);
        let circuit = NumericalCircuit::new(store).unwrap();

        let r = circuit.r_corrected(None).unwrap();
        assert!((r[0] - 0.01 * 1.2).abs() < 1e-15);
        let r1 = circuit.r_corrected(Some(1)).unwrap();
        assert!((r1[0] - 0.01 * 1.1).abs() < 1e-15);
        assert!(circuit.r_corrected(Some(2)).is_err());
    }

    #[test]
    fn test_get_b_is_imaginary_ybus() {
        let circuit = NumericalCircuit::new(two_bus_store()).unwrap();
        let b = circuit.get_b(false).unwrap();
        let ys = Complex64::new(0.01, 0.1).inv();
        assert!((b.get(0, 0).copied().unwrap_or_default() - ys.im).abs() < 1e-10);
        assert!((b.get(0, 1).copied().unwrap_or_default() + ys.im).abs() < 1e-10);
    }

    #[test]
    fn test_compute_writes_back_types() {
        let mut store = two_bus_store();
        store.bus.types = vec![BusType::PQ, BusType::PV];
        let mut circuit = NumericalCircuit::new(store).unwrap();
        let islands = circuit.compute(&CircuitConfig::default()).unwrap();
        assert_eq!(islands.len(), 1);
        assert_eq!(circuit.bus_types(), &[BusType::PQ, BusType::Slack]);
    }
}
