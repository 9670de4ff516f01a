//! One probing run from configuration to closed result file.
//!
//! Checks are ordered so that nothing irreversible happens before the inputs
//! are known to be good: configuration is validated first, then the
//! coordinate table is loaded and the visit plan built, then instruments are
//! connected, and only then is the result file opened.

use crate::config::{ProbeConfig, RunMode};
use crate::coordinates::StructureTable;
use crate::error::{AppResult, ProbeError};
use crate::instrument::{self, Instruments};
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::plan::MeasurementPlan;
use crate::recipes::{RecipeRegistry, STANDARD_REGISTRY};
use crate::sink::{CsvResultSink, ResultSink};
use crate::timing::{Delay, Timing, TokioDelay};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A configured run, ready to start.
pub struct Session {
    config: ProbeConfig,
    instruments: Option<Instruments>,
    registry: Option<RecipeRegistry>,
    delay: Arc<dyn Delay>,
}

impl Session {
    /// Session on the configured bus with the standard recipes and real sleeps.
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            instruments: None,
            registry: None,
            delay: Arc::new(TokioDelay),
        }
    }

    /// Use these endpoints instead of connecting to the configured bus.
    pub fn with_instruments(mut self, instruments: Instruments) -> Self {
        self.instruments = Some(instruments);
        self
    }

    /// Measure with these recipes instead of [`STANDARD_REGISTRY`].
    pub fn with_registry(mut self, registry: RecipeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Wait policy for every settle, grace and inter-command delay.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Validate, plan, connect and measure.
    pub async fn run(self) -> AppResult<RunSummary> {
        let config = &self.config;
        config.validate()?;
        let output_mode = config.output_mode();

        let table = StructureTable::load(&config.run.coordinates)?;
        info!(
            path = %config.run.coordinates.display(),
            structures = table.len(),
            "Coordinate table loaded"
        );
        let plan = MeasurementPlan::build(&table, &config.plan_options())?;

        let instruments = match self.instruments {
            Some(instruments) => instruments,
            None => instrument::connect(&config.bus, &config.timing, self.delay.clone())
                .await
                .map_err(ProbeError::instrument)?,
        };

        let sink: Option<Box<dyn ResultSink>> = match config.run.mode {
            RunMode::Measure => {
                let path = config
                    .run
                    .output
                    .clone()
                    .unwrap_or_else(|| default_output_path(Local::now(), config));
                Some(Box::new(CsvResultSink::open(&path, output_mode)?))
            }
            RunMode::Dry => None,
        };

        if config.run.mode == RunMode::Measure {
            warn!(
                wafer = ?config.run.wafer,
                die = ?config.run.die,
                "Measure mode: probes will contact the wafer"
            );
            self.delay
                .wait(Duration::from_millis(config.run.grace_period_ms))
                .await;
        }

        let registry = self.registry.as_ref().unwrap_or(&*STANDARD_REGISTRY);
        let mut orchestrator = Orchestrator::new(
            instruments,
            registry,
            self.delay.clone(),
            Timing::from(&config.timing),
        )
        .with_mode(config.run.mode)
        .with_identity(config.identity());

        orchestrator.run(plan.visits(), sink).await
    }
}

/// `{YYYYmmdd-HHMMSS}_wafer{w}_die{d}.csv` in the working directory.
pub fn default_output_path(now: DateTime<Local>, config: &ProbeConfig) -> PathBuf {
    let number = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();
    PathBuf::from(format!(
        "{}_wafer{}_die{}.csv",
        now.format("%Y%m%d-%H%M%S"),
        number(config.run.wafer),
        number(config.run.die)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_output_path() {
        let mut config = ProbeConfig::default();
        config.run.wafer = Some(7);
        config.run.die = Some(21);
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            default_output_path(now, &config),
            PathBuf::from("20240305-140709_wafer7_die21.csv")
        );
    }
}
