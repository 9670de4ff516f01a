//! Per-structure measurement sequencing.
//!
//! A run walks the planned structures strictly in order:
//!
//! ```text
//! Idle -> [Translating -> Settling -> Contacting ->
//!          [Connecting -> Forcing -> Sampling -> Recording -> Disconnecting] x N
//!          -> Separating] x M -> Done
//! ```
//!
//! Dry runs skip the physical contact and the result sink but issue every
//! other command, so a rehearsal exercises the same stage moves and matrix
//! programming as the real thing. On any failure the source is de-energised
//! and the chuck separated before the error is returned, and the sink is
//! closed on every exit path.

use crate::config::RunMode;
use crate::error::{AppResult, ProbeError};
use crate::instrument::Instruments;
use crate::plan::PlannedStructure;
use crate::recipes::{DriveCurrent, RecipeRegistry};
use crate::sink::{ResultRecord, ResultSink};
use crate::timing::{Delay, Timing};
use std::sync::Arc;
use tracing::{debug, info, info_span, trace, warn, Instrument as _};

const SEPARATOR: &str = "----------------------------------------";

/// Where a run is in the per-structure sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started
    Idle,
    /// Moving to the next structure
    Translating,
    /// Waiting for the stage to settle
    Settling,
    /// Touching down (skipped on dry runs)
    Contacting,
    /// Programming the matrix for a step
    Connecting,
    /// Source enabled, waiting to sample
    Forcing,
    /// Reading the multimeter
    Sampling,
    /// Emitting the result record
    Recording,
    /// Source disabled after a step
    Disconnecting,
    /// Lifting the chuck
    Separating,
    /// Every structure visited
    Done,
    /// Stopped on an error; instruments were made safe
    Aborted,
}

/// Wafer and die stamped on every result row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunIdentity {
    /// Wafer number
    pub wafer: Option<u32>,
    /// Die number
    pub die: Option<u32>,
}

/// Counts reported by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Structures fully measured
    pub structures: usize,
    /// Voltage samples taken
    pub measurements: usize,
    /// Rows handed to the sink
    pub records_written: usize,
}

/// Drives the instruments through a list of planned structures.
pub struct Orchestrator<'r> {
    instruments: Instruments,
    registry: &'r RecipeRegistry,
    delay: Arc<dyn Delay>,
    timing: Timing,
    mode: RunMode,
    identity: RunIdentity,
    state: RunState,
}

impl<'r> Orchestrator<'r> {
    /// Dry-run orchestrator with no wafer or die set.
    pub fn new(
        instruments: Instruments,
        registry: &'r RecipeRegistry,
        delay: Arc<dyn Delay>,
        timing: Timing,
    ) -> Self {
        Self {
            instruments,
            registry,
            delay,
            timing,
            mode: RunMode::Dry,
            identity: RunIdentity::default(),
            state: RunState::Idle,
        }
    }

    /// Run mode; only `Measure` contacts and records.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Wafer and die for the result rows.
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Current state; `Done` or `Aborted` after `run` returns.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Measure every planned structure, then close `sink`.
    pub async fn run(
        &mut self,
        visits: &[PlannedStructure],
        mut sink: Option<Box<dyn ResultSink>>,
    ) -> AppResult<RunSummary> {
        info!(mode = ?self.mode, structures = visits.len(), "Run starting");

        let outcome = self.visit_all(visits, sink.as_deref_mut()).await;
        let outcome = match outcome {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.enter(RunState::Aborted);
                warn!(error = %err, "Run aborted");
                self.make_safe().await;
                Err(err)
            }
        };

        let closed = match sink.as_mut() {
            Some(sink) => sink.close(),
            None => Ok(()),
        };

        match (outcome, closed) {
            (Ok(summary), Ok(())) => {
                info!(
                    structures = summary.structures,
                    measurements = summary.measurements,
                    written = summary.records_written,
                    "Run complete"
                );
                Ok(summary)
            }
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "Result file could not be closed");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
        }
    }

    async fn visit_all(
        &mut self,
        visits: &[PlannedStructure],
        mut sink: Option<&mut (dyn ResultSink + 'static)>,
    ) -> AppResult<RunSummary> {
        self.instruments
            .stage
            .separate()
            .await
            .map_err(ProbeError::instrument)?;

        let mut summary = RunSummary::default();
        for visit in visits {
            let span = info_span!(
                "structure",
                index = visit.position,
                row = visit.record.index,
                structure = %visit.record.structure_tag()
            );
            self.visit(visit, sink.as_deref_mut(), &mut summary)
                .instrument(span)
                .await?;
            summary.structures += 1;
        }

        self.enter(RunState::Done);
        Ok(summary)
    }

    async fn visit(
        &mut self,
        visit: &PlannedStructure,
        mut sink: Option<&mut (dyn ResultSink + 'static)>,
        summary: &mut RunSummary,
    ) -> AppResult<()> {
        let record = &visit.record;
        let registry = self.registry;
        let recipe = registry.resolve(record)?;
        let currents = recipe
            .steps()
            .iter()
            .map(|step| recipe.drive_current(step, record))
            .collect::<AppResult<Vec<DriveCurrent>>>()?;

        let stage = self.instruments.stage.clone();
        let matrix = self.instruments.matrix.clone();
        let source = self.instruments.source.clone();
        let voltmeter = self.instruments.voltmeter.clone();

        self.enter(RunState::Translating);
        debug!(dx = visit.relative.dx, dy = visit.relative.dy, "Moving to structure");
        stage
            .translate(visit.relative.dx, visit.relative.dy)
            .await
            .map_err(ProbeError::instrument)?;

        self.enter(RunState::Settling);
        self.delay.wait(self.timing.settle_after_move).await;

        self.enter(RunState::Contacting);
        if self.mode == RunMode::Measure {
            stage.contact().await.map_err(ProbeError::instrument)?;
        }
        self.delay.wait(self.timing.contact_settle).await;

        for (step, current) in recipe.steps().iter().zip(currents) {
            let configuration = step.configuration;

            self.enter(RunState::Connecting);
            matrix.clear().await.map_err(ProbeError::instrument)?;
            for (port, pin) in configuration.connections() {
                matrix
                    .connect(port, pin)
                    .await
                    .map_err(ProbeError::instrument)?;
            }

            self.enter(RunState::Forcing);
            source
                .force_current(current)
                .await
                .map_err(ProbeError::instrument)?;
            self.delay.wait(self.timing.sample_settle).await;

            self.enter(RunState::Sampling);
            let voltage = voltmeter
                .read_voltage()
                .await
                .map_err(ProbeError::instrument)?;
            let amps = current.amps();

            self.enter(RunState::Recording);
            let result = ResultRecord {
                index: visit.position,
                wafer: self.identity.wafer,
                die: self.identity.die,
                block: record.block(),
                material: record.material(),
                structure: record.structure_tag(),
                config: configuration.name.to_string(),
                current: amps,
                voltage,
                resistance: voltage / amps,
            };
            info!(
                config = configuration.name,
                current = %current,
                voltage,
                resistance = result.resistance,
                "Measured"
            );
            summary.measurements += 1;
            if self.mode == RunMode::Measure {
                if let Some(sink) = sink.as_deref_mut() {
                    sink.append(&result)?;
                    summary.records_written += 1;
                }
            }

            self.enter(RunState::Disconnecting);
            source.disable().await.map_err(ProbeError::instrument)?;
        }

        self.enter(RunState::Separating);
        stage.separate().await.map_err(ProbeError::instrument)?;
        self.delay.wait(self.timing.post_separation).await;
        info!("{}", SEPARATOR);
        Ok(())
    }

    /// De-energise the source and lift the chuck, logging rather than
    /// returning failures.
    async fn make_safe(&self) {
        if let Err(err) = self.instruments.source.disable().await {
            warn!(error = %format!("{:#}", err), "Could not disable current source");
        }
        if let Err(err) = self.instruments.stage.separate().await {
            warn!(error = %format!("{:#}", err), "Could not separate chuck");
        }
    }

    fn enter(&mut self, state: RunState) {
        trace!(from = ?self.state, to = ?state, "State transition");
        self.state = state;
    }
}
