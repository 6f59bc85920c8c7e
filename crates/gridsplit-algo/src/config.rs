//! Compilation options for [`NumericalCircuit`](crate::NumericalCircuit).
//!
//! Options are read from TOML; partial files fall back to defaults for every
//! field they omit.

use std::path::Path;

use gridsplit_core::{GridError, GridResult};
use serde::{Deserialize, Serialize};

/// How the per-branch impedance tolerance adjusts resistance before assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImpedanceToleranceMode {
    /// Use resistance as given
    #[default]
    Specified,
    /// Scale resistance by `1 - tol/100`
    Lower,
    /// Scale resistance by `1 + tol/100`
    Upper,
}

impl ImpedanceToleranceMode {
    /// Multiplicative resistance factor for a tolerance given in percent.
    pub fn factor(self, tolerance_pct: f64) -> f64 {
        match self {
            ImpedanceToleranceMode::Specified => 1.0,
            ImpedanceToleranceMode::Lower => 1.0 - tolerance_pct / 100.0,
            ImpedanceToleranceMode::Upper => 1.0 + tolerance_pct / 100.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImpedanceToleranceMode::Specified => "specified",
            ImpedanceToleranceMode::Lower => "lower",
            ImpedanceToleranceMode::Upper => "upper",
        }
    }
}

impl From<&str> for ImpedanceToleranceMode {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "specified" => ImpedanceToleranceMode::Specified,
            "lower" => ImpedanceToleranceMode::Lower,
            "upper" => ImpedanceToleranceMode::Upper,
            other => {
                tracing::warn!(mode = other, "unknown impedance tolerance mode, using specified");
                ImpedanceToleranceMode::Specified
            }
        }
    }
}

impl From<String> for ImpedanceToleranceMode {
    fn from(s: String) -> Self {
        ImpedanceToleranceMode::from(s.as_str())
    }
}

impl From<ImpedanceToleranceMode> for String {
    fn from(mode: ImpedanceToleranceMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Options consumed by `compute`, `compute_ts` and `get_raw_circuit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Add battery injections to Sbus.
    pub add_storage: bool,

    /// Add generator injections to Sbus.
    pub add_generation: bool,

    /// Use temperature-corrected resistance.
    pub apply_temperature: bool,

    /// Resistance adjustment applied from the impedance tolerance.
    pub branch_tolerance_mode: ImpedanceToleranceMode,

    /// Tolerance (%) applied to every branch; `None` uses each branch's own value.
    pub impedance_tolerance: Option<f64>,

    /// Drop islands made of a single bus.
    pub ignore_single_node_islands: bool,

    /// Evaluate distinct topology states on the rayon pool.
    pub parallel: bool,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            add_storage: true,
            add_generation: true,
            apply_temperature: false,
            branch_tolerance_mode: ImpedanceToleranceMode::Specified,
            impedance_tolerance: None,
            ignore_single_node_islands: false,
            parallel: true,
        }
    }
}

impl CircuitConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> GridResult<Self> {
        toml::from_str(contents).map_err(|e| GridError::Parse(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> GridResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> GridResult<String> {
        toml::to_string_pretty(self).map_err(|e| GridError::Parse(e.to_string()))
    }

    pub fn with_tolerance(mut self, mode: ImpedanceToleranceMode, pct: f64) -> Self {
        self.branch_tolerance_mode = mode;
        self.impedance_tolerance = Some(pct);
        self
    }

    pub fn with_temperature(mut self, apply: bool) -> Self {
        self.apply_temperature = apply;
        self
    }

    pub fn with_ignore_single_node_islands(mut self, ignore: bool) -> Self {
        self.ignore_single_node_islands = ignore;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
