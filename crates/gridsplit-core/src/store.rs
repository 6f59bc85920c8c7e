//! The element store: every element group of one network plus its time axis.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};

use crate::elements::{
    BatteryData, BranchData, BusData, GeneratorData, LoadData, ShuntData, StaticGeneratorData,
};
use crate::error::{ensure_indices, ensure_len, GridError, GridResult};
use crate::profile::Profile;

/// Flat per-unit arrays for a whole network.
///
/// Populated once by a loader; afterwards only [`ElementStore::re_index_time`],
/// [`ElementStore::set_base_profile`] and the bus-type write-back after
/// partitioning mutate it.
#[derive(Debug, Clone)]
pub struct ElementStore {
    /// Base power (MVA)
    pub sbase: f64,
    pub n_time: usize,
    pub time_array: Vec<NaiveDateTime>,
    pub bus: BusData,
    pub branch: BranchData,
    pub load: LoadData,
    pub generator: GeneratorData,
    pub static_generator: StaticGeneratorData,
    pub battery: BatteryData,
    pub shunt: ShuntData,
}

/// Element counts used to size a new [`ElementStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementCounts {
    pub bus: usize,
    pub branch: usize,
    pub load: usize,
    pub generator: usize,
    pub static_generator: usize,
    pub battery: usize,
    pub shunt: usize,
}

impl ElementStore {
    /// Store with default-valued arrays for the given counts and horizon.
    pub fn new(counts: ElementCounts, n_time: usize, sbase: f64) -> Self {
        Self {
            sbase,
            n_time,
            time_array: vec![NaiveDateTime::default(); n_time],
            bus: BusData::new(counts.bus, n_time),
            branch: BranchData::new(counts.branch, n_time),
            load: LoadData::new(counts.load, n_time),
            generator: GeneratorData::new(counts.generator, n_time),
            static_generator: StaticGeneratorData::new(counts.static_generator, n_time),
            battery: BatteryData::new(counts.battery, n_time),
            shunt: ShuntData::new(counts.shunt, n_time),
        }
    }

    pub fn n_bus(&self) -> usize {
        self.bus.len()
    }

    pub fn n_branch(&self) -> usize {
        self.branch.len()
    }

    pub fn counts(&self) -> ElementCounts {
        ElementCounts {
            bus: self.bus.len(),
            branch: self.branch.len(),
            load: self.load.len(),
            generator: self.generator.len(),
            static_generator: self.static_generator.len(),
            battery: self.battery.len(),
            shunt: self.shunt.len(),
        }
    }

    /// Check every array and profile against the declared counts and horizon.
    pub fn validate(&self) -> GridResult<()> {
        if !(self.sbase.is_finite() && self.sbase > 0.0) {
            return Err(GridError::Config(format!(
                "base power must be positive, got {}",
                self.sbase
            )));
        }
        ensure_len("time_array", self.n_time, self.time_array.len())?;
        let n_bus = self.n_bus();
        self.bus.validate(self.n_time)?;
        self.branch.validate(n_bus, self.n_time)?;
        self.load.validate(n_bus, self.n_time)?;
        self.generator.validate(n_bus, self.n_time)?;
        self.static_generator.validate(n_bus, self.n_time)?;
        self.battery.validate(n_bus, self.n_time)?;
        self.shunt.validate(n_bus, self.n_time)
    }

    /// Replace every profile by a single step equal to the static values.
    ///
    /// The time array holds January 1st, 00:00 of the current year.
    pub fn set_base_profile(&mut self) {
        let year = Local::now().year();
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        self.time_array = vec![start];
        self.n_time = 1;

        self.bus.active_prof = Profile::from_static(&self.bus.active);

        let br = &mut self.branch;
        br.active_prof = Profile::from_static(&br.active);
        br.temp_oper_prof = Profile::from_static(&br.temp_oper);
        br.rates_prof = Profile::from_static(&br.rates);

        let ld = &mut self.load;
        ld.active_prof = Profile::from_static(&ld.active);
        ld.power_prof = Profile::from_static(&ld.power);
        ld.current_prof = Profile::from_static(&ld.current);
        ld.admittance_prof = Profile::from_static(&ld.admittance);

        let gen = &mut self.generator;
        gen.active_prof = Profile::from_static(&gen.active);
        gen.power_prof = Profile::from_static(&gen.power);
        gen.power_factor_prof = Profile::from_static(&gen.power_factor);
        gen.voltage_prof = Profile::from_static(&gen.voltage);

        let sg = &mut self.static_generator;
        sg.active_prof = Profile::from_static(&sg.active);
        sg.power_prof = Profile::from_static(&sg.power);

        let bt = &mut self.battery;
        bt.active_prof = Profile::from_static(&bt.active);
        bt.power_prof = Profile::from_static(&bt.power);
        bt.voltage_prof = Profile::from_static(&bt.voltage);

        let sh = &mut self.shunt;
        sh.active_prof = Profile::from_static(&sh.active);
        sh.admittance_prof = Profile::from_static(&sh.admittance);
    }

    /// Keep only the listed time steps of every profile, in the given order.
    pub fn re_index_time(&mut self, t_idx: &[usize]) -> GridResult<()> {
        ensure_indices("time index", t_idx, self.n_time)?;
        self.time_array = t_idx.iter().map(|&t| self.time_array[t]).collect();
        self.n_time = t_idx.len();

        self.bus.active_prof = self.bus.active_prof.select_rows(t_idx);

        let br = &mut self.branch;
        br.active_prof = br.active_prof.select_rows(t_idx);
        br.temp_oper_prof = br.temp_oper_prof.select_rows(t_idx);
        br.rates_prof = br.rates_prof.select_rows(t_idx);

        let ld = &mut self.load;
        ld.active_prof = ld.active_prof.select_rows(t_idx);
        ld.power_prof = ld.power_prof.select_rows(t_idx);
        ld.current_prof = ld.current_prof.select_rows(t_idx);
        ld.admittance_prof = ld.admittance_prof.select_rows(t_idx);

        let gen = &mut self.generator;
        gen.active_prof = gen.active_prof.select_rows(t_idx);
        gen.power_prof = gen.power_prof.select_rows(t_idx);
        gen.power_factor_prof = gen.power_factor_prof.select_rows(t_idx);
        gen.voltage_prof = gen.voltage_prof.select_rows(t_idx);

        let sg = &mut self.static_generator;
        sg.active_prof = sg.active_prof.select_rows(t_idx);
        sg.power_prof = sg.power_prof.select_rows(t_idx);

        let bt = &mut self.battery;
        bt.active_prof = bt.active_prof.select_rows(t_idx);
        bt.power_prof = bt.power_prof.select_rows(t_idx);
        bt.voltage_prof = bt.voltage_prof.select_rows(t_idx);

        let sh = &mut self.shunt;
        sh.active_prof = sh.active_prof.select_rows(t_idx);
        sh.admittance_prof = sh.admittance_prof.select_rows(t_idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn counts() -> ElementCounts {
        ElementCounts {
            bus: 3,
            branch: 2,
            load: 1,
            generator: 1,
            ..ElementCounts::default()
        }
    }

    #[test]
    fn test_new_store_validates() {
        let store = ElementStore::new(counts(), 4, 100.0);
        assert!(store.validate().is_ok());
        assert_eq!(store.counts(), counts());
    }

    #[test]
    fn test_validate_rejects_bad_sbase() {
        let store = ElementStore::new(counts(), 0, 0.0);
        assert!(matches!(store.validate(), Err(GridError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_profile_shape() {
        let mut store = ElementStore::new(counts(), 2, 100.0);
        store.branch.active_prof = Profile::repeat(3, &[true, true]);
        assert!(matches!(store.validate(), Err(GridError::Shape { .. })));
    }

    #[test]
    fn test_set_base_profile_copies_static_values() {
        let mut store = ElementStore::new(counts(), 0, 100.0);
        store.load.power[0] = Complex64::new(10.0, 5.0);
        store.branch.active[1] = false;
        store.set_base_profile();

        assert_eq!(store.n_time, 1);
        assert_eq!(store.time_array.len(), 1);
        assert_eq!(store.load.power_prof.row(0), &[Complex64::new(10.0, 5.0)]);
        assert_eq!(store.branch.active_prof.row(0), &[true, false]);
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_re_index_time_keeps_selected_rows() {
        let mut store = ElementStore::new(counts(), 3, 100.0);
        for t in 0..3 {
            store.load.power_prof.set(t, 0, Complex64::new(t as f64, 0.0));
        }
        store.re_index_time(&[2, 0]).unwrap();

        assert_eq!(store.n_time, 2);
        assert_eq!(store.load.power_prof.row(0)[0].re, 2.0);
        assert_eq!(store.load.power_prof.row(1)[0].re, 0.0);
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_re_index_time_rejects_unknown_step() {
        let mut store = ElementStore::new(counts(), 2, 100.0);
        assert!(matches!(
            store.re_index_time(&[0, 2]),
            Err(GridError::IndexOutOfRange { index: 2, .. })
        ));
    }
}
