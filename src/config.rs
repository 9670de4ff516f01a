//! Run configuration.
//!
//! Values are layered, later sources winning:
//! 1. built-in defaults
//! 2. a TOML file (default `config/probe.toml`, skipped when absent)
//! 3. environment variables prefixed with `PROBE_`, sections split on `__`
//! 4. command-line flags (see [`crate::cli`])
//!
//! ```text
//! PROBE_APPLICATION__LOG_LEVEL=debug
//! PROBE_RUN__WAFER=12
//! PROBE_BUS__BACKEND=simulated
//! ```
//!
//! [`ProbeConfig::validate`] runs after all layers are merged and before any
//! file or instrument is touched.

use crate::error::{AppResult, ProbeError};
use crate::filter::DEFAULT_FILTER;
use crate::orchestrator::RunIdentity;
use crate::plan::PlanOptions;
use crate::sink::OutputMode;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Config file read when none is named.
pub const DEFAULT_CONFIG_PATH: &str = "config/probe.toml";
const ENV_PREFIX: &str = "PROBE_";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Process-wide settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// What to measure and where results go
    #[serde(default)]
    pub run: RunConfig,
    /// Fixed waits
    #[serde(default)]
    pub timing: TimingConfig,
    /// Instrument bus and addresses
    #[serde(default)]
    pub bus: BusConfig,
}

/// `[application]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// trace, debug, info, warn or error. `RUST_LOG` takes precedence.
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Whether a run touches down and records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Move and switch without touching down or writing results.
    #[default]
    Dry,
    /// Contact every structure and write the result file.
    Measure,
}

/// `[run]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Dry or measure
    pub mode: RunMode,
    /// Wafer number, required to measure
    pub wafer: Option<u32>,
    /// Die number, required to measure
    pub die: Option<u32>,
    /// Structure coordinate table (CSV).
    pub coordinates: PathBuf,
    /// Result file; generated from the timestamp, wafer and die when unset.
    pub output: Option<PathBuf>,
    /// Truncate an existing result file.
    pub output_overwrite: bool,
    /// Append to an existing result file.
    pub output_append: bool,
    /// Row of the unfiltered table used as stage origin.
    pub home_index: usize,
    /// First position of the filtered, ordered sequence to measure. Resume an
    /// interrupted run with the last recorded `index` plus one.
    pub offset: usize,
    /// Select structures with a predicate.
    pub filter: bool,
    /// Predicate to use instead of the default one.
    pub filter_string: Option<String>,
    /// Columns to order the selection by, most significant first.
    pub order_by: Vec<String>,
    /// Pause after the measure-mode warning, before the first contact.
    pub grace_period_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Dry,
            wafer: None,
            die: None,
            coordinates: PathBuf::from("coordinates.csv"),
            output: None,
            output_overwrite: false,
            output_append: false,
            home_index: 0,
            offset: 0,
            filter: false,
            filter_string: None,
            order_by: Vec::new(),
            grace_period_ms: 4000,
        }
    }
}

/// Fixed waits, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// After each translate.
    pub settle_after_move_ms: u64,
    /// After touchdown.
    pub contact_settle_ms: u64,
    /// Between forcing a current and sampling.
    pub sample_settle_ms: u64,
    /// Pause before every stage command.
    pub stage_command_gap_ms: u64,
    /// After each separate.
    pub post_separation_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_after_move_ms: 2500,
            contact_settle_ms: 500,
            sample_settle_ms: 200,
            stage_command_gap_ms: 500,
            post_separation_ms: 0,
        }
    }
}

/// Transport to the instruments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// GPIB through a USB/serial controller.
    #[default]
    Prologix,
    /// In-process bus answering with a fixed voltage.
    Simulated,
}

/// `[bus]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Controller or simulation
    pub backend: BusBackend,
    /// Serial device of the GPIB controller
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// PA200 probe station
    pub stage_address: u8,
    /// 3458A multimeter
    pub dmm_address: u8,
    /// 4084B switch matrix
    pub matrix_address: u8,
    /// 4142B source-measure unit
    pub smu_address: u8,
    /// Voltage returned by the simulated multimeter
    pub simulated_voltage: f64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::Prologix,
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 3000,
            stage_address: 1,
            dmm_address: 12,
            matrix_address: 22,
            smu_address: 23,
            simulated_voltage: 1.0e-3,
        }
    }
}

impl ProbeConfig {
    /// Defaults, then `path` if it exists, then `PROBE_` environment variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(ProbeError::from)
    }

    /// The merged provider stack, before extraction.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ProbeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject option combinations that cannot run.
    pub fn validate(&self) -> AppResult<()> {
        if !LOG_LEVELS.contains(&self.application.log_level.as_str()) {
            return Err(ProbeError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        let run = &self.run;
        if run.output_overwrite && run.output_append {
            return Err(ProbeError::Configuration(
                "Output overwrite and append are mutually exclusive".to_string(),
            ));
        }
        if run.mode == RunMode::Measure && (run.wafer.is_none() || run.die.is_none()) {
            return Err(ProbeError::Configuration(
                "Measure mode requires both wafer and die".to_string(),
            ));
        }
        if run.filter_string.is_some() && !run.filter {
            return Err(ProbeError::Configuration(
                "A filter string was given but filtering is not enabled".to_string(),
            ));
        }
        if run.order_by.iter().any(|c| c.trim().is_empty()) {
            return Err(ProbeError::Configuration(
                "order_by column names cannot be empty".to_string(),
            ));
        }

        let bus = &self.bus;
        let addresses = [
            ("stage", bus.stage_address),
            ("dmm", bus.dmm_address),
            ("matrix", bus.matrix_address),
            ("smu", bus.smu_address),
        ];
        let mut seen = HashSet::new();
        for (name, address) in addresses {
            if address > 30 {
                return Err(ProbeError::Configuration(format!(
                    "GPIB address {} for {} is outside 0-30",
                    address, name
                )));
            }
            if !seen.insert(address) {
                return Err(ProbeError::Configuration(format!(
                    "GPIB address {} is assigned to more than one instrument",
                    address
                )));
            }
        }
        if bus.timeout_ms == 0 {
            return Err(ProbeError::Configuration(
                "Bus timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Result file mode from the overwrite and append flags.
    pub fn output_mode(&self) -> OutputMode {
        if self.run.output_overwrite {
            OutputMode::Overwrite
        } else if self.run.output_append {
            OutputMode::Append
        } else {
            OutputMode::CreateNew
        }
    }

    /// The active filter expression, falling back to the default filter.
    pub fn filter_expression(&self) -> Option<String> {
        if !self.run.filter {
            return None;
        }
        Some(
            self.run
                .filter_string
                .clone()
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
        )
    }

    /// Plan options for this run.
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            home_index: self.run.home_index,
            filter: self.filter_expression(),
            order_by: self.run.order_by.clone(),
            offset: self.run.offset,
        }
    }

    /// Wafer and die for the result rows.
    pub fn identity(&self) -> RunIdentity {
        RunIdentity {
            wafer: self.run.wafer,
            die: self.run.die,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn measure_config() -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.run.mode = RunMode::Measure;
        config.run.wafer = Some(3);
        config.run.die = Some(14);
        config
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ProbeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.output_mode(), OutputMode::CreateNew);
        assert_eq!(config.filter_expression(), None);
        assert_eq!(config.timing.settle_after_move_ms, 2500);
        assert_eq!(config.bus.smu_address, 23);
    }

    #[test]
    fn test_overwrite_and_append_conflict() {
        let mut config = measure_config();
        config.run.output_overwrite = true;
        config.run.output_append = true;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_measure_requires_wafer_and_die() {
        let mut config = measure_config();
        config.run.die = None;
        assert!(config.validate().is_err());
        config.run.mode = RunMode::Dry;
        config.validate().unwrap();
    }

    #[test]
    fn test_filter_string_needs_filter_flag() {
        let mut config = ProbeConfig::default();
        config.run.filter_string = Some("block == 1".to_string());
        assert!(config.validate().is_err());

        config.run.filter = true;
        config.validate().unwrap();
        assert_eq!(config.filter_expression().as_deref(), Some("block == 1"));
    }

    #[test]
    fn test_filter_flag_alone_uses_default() {
        let mut config = ProbeConfig::default();
        config.run.filter = true;
        assert_eq!(config.filter_expression().as_deref(), Some(DEFAULT_FILTER));
    }

    #[test]
    fn test_duplicate_gpib_address() {
        let mut config = ProbeConfig::default();
        config.bus.matrix_address = config.bus.dmm_address;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than one instrument"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ProbeConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "probe.toml",
                r#"
[run]
mode = "measure"
wafer = 5
die = 2
order_by = ["block"]

[timing]
settle_after_move_ms = 1000

[bus]
backend = "simulated"
"#,
            )?;

            let config = ProbeConfig::load_from("probe.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.run.mode, RunMode::Measure);
            assert_eq!(config.run.wafer, Some(5));
            assert_eq!(config.run.order_by, vec!["block".to_string()]);
            assert_eq!(config.timing.settle_after_move_ms, 1000);
            assert_eq!(config.timing.contact_settle_ms, 500);
            assert_eq!(config.bus.backend, BusBackend::Simulated);
            assert_eq!(config.bus.dmm_address, 12);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = ProbeConfig::load_from("absent.toml").map_err(|e| e.to_string())?;
            assert_eq!(config, ProbeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("probe.toml", "[run]\nwafer = 1\n")?;
            jail.set_env("PROBE_RUN__WAFER", "9");
            jail.set_env("PROBE_APPLICATION__LOG_LEVEL", "debug");

            let config = ProbeConfig::load_from("probe.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.run.wafer, Some(9));
            assert_eq!(config.application.log_level, "debug");
            Ok(())
        });
    }
}
