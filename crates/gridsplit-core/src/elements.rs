//! Flat per-unit arrays for every element group.
//!
//! Each group is a struct of arrays: one `Vec` per attribute, indexed by
//! element, plus a [`Profile`] for every attribute that varies over time.
//! Elements attached to a bus (loads, generators, ...) carry the index of
//! that bus; their bus-incidence matrix is derived from it, so every element
//! maps to exactly one bus by construction.

use num_complex::Complex64;
use sprs::{CsMat, TriMat};

use crate::error::{ensure_indices, ensure_len, GridResult};
use crate::profile::Profile;
use crate::BusType;

/// Build the `buses x elements` 0/1 incidence matrix (CSR).
pub fn bus_incidence(what: &str, bus: &[usize], n_bus: usize) -> GridResult<CsMat<f64>> {
    ensure_indices(what, bus, n_bus)?;
    let mut tri = TriMat::with_capacity((n_bus, bus.len()), bus.len());
    for (k, &b) in bus.iter().enumerate() {
        tri.add_triplet(b, k, 1.0);
    }
    Ok(tri.to_csr())
}

/// Build the `elements x buses` 0/1 incidence matrix (CSR).
pub fn element_incidence(what: &str, bus: &[usize], n_bus: usize) -> GridResult<CsMat<f64>> {
    ensure_indices(what, bus, n_bus)?;
    let mut tri = TriMat::with_capacity((bus.len(), n_bus), bus.len());
    for (k, &b) in bus.iter().enumerate() {
        tri.add_triplet(k, b, 1.0);
    }
    Ok(tri.to_csr())
}

/// Network nodes.
#[derive(Debug, Clone, Default)]
pub struct BusData {
    pub names: Vec<String>,
    /// Nominal voltage (kV)
    pub vnom: Vec<f64>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    /// Initial complex voltage (p.u.)
    pub v0: Vec<Complex64>,
    pub vmin: Vec<f64>,
    pub vmax: Vec<f64>,
    /// Bus types; rewritten after island partitioning
    pub types: Vec<BusType>,
}

impl BusData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("bus {i}")).collect(),
            vnom: vec![0.0; n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            v0: vec![Complex64::new(1.0, 0.0); n],
            vmin: vec![0.9; n],
            vmax: vec![1.1; n],
            types: vec![BusType::PQ; n],
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn validate(&self, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("bus.names", n, self.names.len())?;
        ensure_len("bus.vnom", n, self.vnom.len())?;
        ensure_len("bus.v0", n, self.v0.len())?;
        ensure_len("bus.vmin", n, self.vmin.len())?;
        ensure_len("bus.vmax", n, self.vmax.len())?;
        ensure_len("bus.types", n, self.types.len())?;
        self.active_prof.ensure_shape("bus.active_prof", n_time, n)
    }
}

/// Lines and transformers.
#[derive(Debug, Clone, Default)]
pub struct BranchData {
    pub names: Vec<String>,
    /// From-bus index
    pub f: Vec<usize>,
    /// To-bus index
    pub t: Vec<usize>,
    /// Series resistance (p.u.)
    pub r: Vec<f64>,
    /// Series reactance (p.u.)
    pub x: Vec<f64>,
    /// Shunt conductance (p.u.)
    pub g: Vec<f64>,
    /// Shunt susceptance (p.u.)
    pub b: Vec<f64>,
    /// Impedance tolerance (%)
    pub impedance_tolerance: Vec<f64>,
    /// Tap modulus; zero means nominal
    pub tap_mod: Vec<f64>,
    /// Tap angle (rad)
    pub tap_ang: Vec<f64>,
    /// Virtual tap from nominal voltage mismatch at the from side
    pub tap_f: Vec<f64>,
    /// Virtual tap from nominal voltage mismatch at the to side
    pub tap_t: Vec<f64>,
    /// Thermal rating (MVA)
    pub rates: Vec<f64>,
    pub rates_prof: Profile<f64>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    /// Temperature at which `r` was measured (°C)
    pub temp_base: Vec<f64>,
    /// Operating temperature (°C)
    pub temp_oper: Vec<f64>,
    pub temp_oper_prof: Profile<f64>,
    /// Resistance temperature coefficient (1/°C)
    pub alpha: Vec<f64>,
}

impl BranchData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("branch {i}")).collect(),
            f: vec![0; n],
            t: vec![0; n],
            r: vec![0.0; n],
            x: vec![0.0; n],
            g: vec![0.0; n],
            b: vec![0.0; n],
            impedance_tolerance: vec![0.0; n],
            tap_mod: vec![1.0; n],
            tap_ang: vec![0.0; n],
            tap_f: vec![1.0; n],
            tap_t: vec![1.0; n],
            rates: vec![0.0; n],
            rates_prof: Profile::new(n_time, n),
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            temp_base: vec![20.0; n],
            temp_oper: vec![20.0; n],
            temp_oper_prof: Profile::repeat(n_time, &vec![20.0; n]),
            alpha: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.f.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f.is_empty()
    }

    /// `branches x buses` from-side incidence `Cf`.
    pub fn from_incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        element_incidence("branch.f", &self.f, n_bus)
    }

    /// `branches x buses` to-side incidence `Ct`.
    pub fn to_incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        element_incidence("branch.t", &self.t, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("branch.names", n, self.names.len())?;
        ensure_len("branch.t", n, self.t.len())?;
        for (what, v) in [
            ("branch.r", &self.r),
            ("branch.x", &self.x),
            ("branch.g", &self.g),
            ("branch.b", &self.b),
            ("branch.impedance_tolerance", &self.impedance_tolerance),
            ("branch.tap_mod", &self.tap_mod),
            ("branch.tap_ang", &self.tap_ang),
            ("branch.tap_f", &self.tap_f),
            ("branch.tap_t", &self.tap_t),
            ("branch.rates", &self.rates),
            ("branch.temp_base", &self.temp_base),
            ("branch.temp_oper", &self.temp_oper),
            ("branch.alpha", &self.alpha),
        ] {
            ensure_len(what, n, v.len())?;
        }
        ensure_len("branch.active", n, self.active.len())?;
        ensure_indices("branch.f", &self.f, n_bus)?;
        ensure_indices("branch.t", &self.t, n_bus)?;
        self.active_prof
            .ensure_shape("branch.active_prof", n_time, n)?;
        self.temp_oper_prof
            .ensure_shape("branch.temp_oper_prof", n_time, n)?;
        self.rates_prof.ensure_shape("branch.rates_prof", n_time, n)
    }
}

/// Loads: constant power, constant current and constant impedance parts.
#[derive(Debug, Clone, Default)]
pub struct LoadData {
    pub names: Vec<String>,
    pub bus: Vec<usize>,
    /// Constant power (MVA)
    pub power: Vec<Complex64>,
    /// Constant current (MVA at 1 p.u.)
    pub current: Vec<Complex64>,
    /// Constant admittance (MVA at 1 p.u.)
    pub admittance: Vec<Complex64>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    pub power_prof: Profile<Complex64>,
    pub current_prof: Profile<Complex64>,
    pub admittance_prof: Profile<Complex64>,
}

impl LoadData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("load {i}")).collect(),
            bus: vec![0; n],
            power: vec![Complex64::default(); n],
            current: vec![Complex64::default(); n],
            admittance: vec![Complex64::default(); n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            power_prof: Profile::new(n_time, n),
            current_prof: Profile::new(n_time, n),
            admittance_prof: Profile::new(n_time, n),
        }
    }

    pub fn len(&self) -> usize {
        self.bus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    /// `buses x loads` incidence.
    pub fn incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        bus_incidence("load.bus", &self.bus, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("load.names", n, self.names.len())?;
        ensure_len("load.power", n, self.power.len())?;
        ensure_len("load.current", n, self.current.len())?;
        ensure_len("load.admittance", n, self.admittance.len())?;
        ensure_len("load.active", n, self.active.len())?;
        ensure_indices("load.bus", &self.bus, n_bus)?;
        self.active_prof.ensure_shape("load.active_prof", n_time, n)?;
        self.power_prof.ensure_shape("load.power_prof", n_time, n)?;
        self.current_prof
            .ensure_shape("load.current_prof", n_time, n)?;
        self.admittance_prof
            .ensure_shape("load.admittance_prof", n_time, n)
    }
}

/// Voltage-controlled generators.
#[derive(Debug, Clone, Default)]
pub struct GeneratorData {
    pub names: Vec<String>,
    pub bus: Vec<usize>,
    /// Active power set point (MW)
    pub power: Vec<f64>,
    /// Power factor; its sign gives the sign of the reactive power
    pub power_factor: Vec<f64>,
    /// Voltage set point (p.u.)
    pub voltage: Vec<f64>,
    pub qmin: Vec<f64>,
    pub qmax: Vec<f64>,
    pub pmin: Vec<f64>,
    pub pmax: Vec<f64>,
    /// Nominal capacity (MVA)
    pub nominal_power: Vec<f64>,
    pub dispatchable: Vec<bool>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    pub power_prof: Profile<f64>,
    pub power_factor_prof: Profile<f64>,
    pub voltage_prof: Profile<f64>,
}

impl GeneratorData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("generator {i}")).collect(),
            bus: vec![0; n],
            power: vec![0.0; n],
            power_factor: vec![0.8; n],
            voltage: vec![1.0; n],
            qmin: vec![0.0; n],
            qmax: vec![0.0; n],
            pmin: vec![0.0; n],
            pmax: vec![0.0; n],
            nominal_power: vec![0.0; n],
            dispatchable: vec![false; n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            power_prof: Profile::new(n_time, n),
            power_factor_prof: Profile::repeat(n_time, &vec![0.8; n]),
            voltage_prof: Profile::repeat(n_time, &vec![1.0; n]),
        }
    }

    pub fn len(&self) -> usize {
        self.bus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    /// `buses x generators` incidence.
    pub fn incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        bus_incidence("generator.bus", &self.bus, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("generator.names", n, self.names.len())?;
        for (what, v) in [
            ("generator.power", &self.power),
            ("generator.power_factor", &self.power_factor),
            ("generator.voltage", &self.voltage),
            ("generator.qmin", &self.qmin),
            ("generator.qmax", &self.qmax),
            ("generator.pmin", &self.pmin),
            ("generator.pmax", &self.pmax),
            ("generator.nominal_power", &self.nominal_power),
        ] {
            ensure_len(what, n, v.len())?;
        }
        ensure_len("generator.dispatchable", n, self.dispatchable.len())?;
        ensure_len("generator.active", n, self.active.len())?;
        ensure_indices("generator.bus", &self.bus, n_bus)?;
        self.active_prof
            .ensure_shape("generator.active_prof", n_time, n)?;
        self.power_prof
            .ensure_shape("generator.power_prof", n_time, n)?;
        self.power_factor_prof
            .ensure_shape("generator.power_factor_prof", n_time, n)?;
        self.voltage_prof
            .ensure_shape("generator.voltage_prof", n_time, n)
    }
}

/// Fixed-injection generators (PV inverters, wind parks without control).
#[derive(Debug, Clone, Default)]
pub struct StaticGeneratorData {
    pub names: Vec<String>,
    pub bus: Vec<usize>,
    /// Complex power injection (MVA)
    pub power: Vec<Complex64>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    pub power_prof: Profile<Complex64>,
}

impl StaticGeneratorData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("static generator {i}")).collect(),
            bus: vec![0; n],
            power: vec![Complex64::default(); n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            power_prof: Profile::new(n_time, n),
        }
    }

    pub fn len(&self) -> usize {
        self.bus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    /// `buses x static generators` incidence.
    pub fn incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        bus_incidence("static_generator.bus", &self.bus, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("static_generator.names", n, self.names.len())?;
        ensure_len("static_generator.power", n, self.power.len())?;
        ensure_len("static_generator.active", n, self.active.len())?;
        ensure_indices("static_generator.bus", &self.bus, n_bus)?;
        self.active_prof
            .ensure_shape("static_generator.active_prof", n_time, n)?;
        self.power_prof
            .ensure_shape("static_generator.power_prof", n_time, n)
    }
}

/// Storage units.
#[derive(Debug, Clone, Default)]
pub struct BatteryData {
    pub names: Vec<String>,
    pub bus: Vec<usize>,
    /// Active power set point (MW)
    pub power: Vec<f64>,
    /// Voltage set point (p.u.)
    pub voltage: Vec<f64>,
    pub qmin: Vec<f64>,
    pub qmax: Vec<f64>,
    pub pmin: Vec<f64>,
    pub pmax: Vec<f64>,
    /// Nominal energy (MWh)
    pub enom: Vec<f64>,
    pub soc_0: Vec<f64>,
    pub min_soc: Vec<f64>,
    pub max_soc: Vec<f64>,
    pub charge_efficiency: Vec<f64>,
    pub discharge_efficiency: Vec<f64>,
    pub dispatchable: Vec<bool>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    pub power_prof: Profile<f64>,
    pub voltage_prof: Profile<f64>,
}

impl BatteryData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("battery {i}")).collect(),
            bus: vec![0; n],
            power: vec![0.0; n],
            voltage: vec![1.0; n],
            qmin: vec![0.0; n],
            qmax: vec![0.0; n],
            pmin: vec![0.0; n],
            pmax: vec![0.0; n],
            enom: vec![0.0; n],
            soc_0: vec![0.5; n],
            min_soc: vec![0.1; n],
            max_soc: vec![0.9; n],
            charge_efficiency: vec![0.9; n],
            discharge_efficiency: vec![0.9; n],
            dispatchable: vec![false; n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            power_prof: Profile::new(n_time, n),
            voltage_prof: Profile::repeat(n_time, &vec![1.0; n]),
        }
    }

    pub fn len(&self) -> usize {
        self.bus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    /// `buses x batteries` incidence.
    pub fn incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        bus_incidence("battery.bus", &self.bus, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("battery.names", n, self.names.len())?;
        for (what, v) in [
            ("battery.power", &self.power),
            ("battery.voltage", &self.voltage),
            ("battery.qmin", &self.qmin),
            ("battery.qmax", &self.qmax),
            ("battery.pmin", &self.pmin),
            ("battery.pmax", &self.pmax),
            ("battery.enom", &self.enom),
            ("battery.soc_0", &self.soc_0),
            ("battery.min_soc", &self.min_soc),
            ("battery.max_soc", &self.max_soc),
            ("battery.charge_efficiency", &self.charge_efficiency),
            ("battery.discharge_efficiency", &self.discharge_efficiency),
        ] {
            ensure_len(what, n, v.len())?;
        }
        ensure_len("battery.dispatchable", n, self.dispatchable.len())?;
        ensure_len("battery.active", n, self.active.len())?;
        ensure_indices("battery.bus", &self.bus, n_bus)?;
        self.active_prof
            .ensure_shape("battery.active_prof", n_time, n)?;
        self.power_prof
            .ensure_shape("battery.power_prof", n_time, n)?;
        self.voltage_prof
            .ensure_shape("battery.voltage_prof", n_time, n)
    }
}

/// Fixed shunt admittances.
#[derive(Debug, Clone, Default)]
pub struct ShuntData {
    pub names: Vec<String>,
    pub bus: Vec<usize>,
    /// Admittance (MVA at 1 p.u.)
    pub admittance: Vec<Complex64>,
    pub active: Vec<bool>,
    pub active_prof: Profile<bool>,
    pub admittance_prof: Profile<Complex64>,
}

impl ShuntData {
    pub fn new(n: usize, n_time: usize) -> Self {
        Self {
            names: (0..n).map(|i| format!("shunt {i}")).collect(),
            bus: vec![0; n],
            admittance: vec![Complex64::default(); n],
            active: vec![true; n],
            active_prof: Profile::repeat(n_time, &vec![true; n]),
            admittance_prof: Profile::new(n_time, n),
        }
    }

    pub fn len(&self) -> usize {
        self.bus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bus.is_empty()
    }

    /// `buses x shunts` incidence.
    pub fn incidence(&self, n_bus: usize) -> GridResult<CsMat<f64>> {
        bus_incidence("shunt.bus", &self.bus, n_bus)
    }

    pub(crate) fn validate(&self, n_bus: usize, n_time: usize) -> GridResult<()> {
        let n = self.len();
        ensure_len("shunt.names", n, self.names.len())?;
        ensure_len("shunt.admittance", n, self.admittance.len())?;
        ensure_len("shunt.active", n, self.active.len())?;
        ensure_indices("shunt.bus", &self.bus, n_bus)?;
        self.active_prof
            .ensure_shape("shunt.active_prof", n_time, n)?;
        self.admittance_prof
            .ensure_shape("shunt.admittance_prof", n_time, n)
    }
}
