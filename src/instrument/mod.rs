//! Instrument endpoints used by a probing run.
//!
//! The orchestrator only sees the four capability traits below. Concrete
//! drivers talk over a [`bus::SharedBus`]; [`mock::MockInstruments`] stands
//! in for all four in tests.

pub mod bus;
pub mod hp3458;
pub mod hp4084;
pub mod hp4142;
pub mod mock;
pub mod pa200;
#[cfg(feature = "instrument_serial")]
pub mod prologix;
pub mod simulated;

use crate::config::{BusBackend, BusConfig, TimingConfig};
use crate::recipes::{DriveCurrent, Pin, Port};
use crate::timing::Delay;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bus::{shared, BusEndpoint, SharedBus};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Probe station chuck and stage.
#[async_trait]
pub trait ProbeStage: Send + Sync {
    /// Relative move in microns.
    async fn translate(&self, dx: f64, dy: f64) -> Result<()>;
    /// Raise the chuck until the probes touch down.
    async fn contact(&self) -> Result<()>;
    /// Lower the chuck clear of the probes.
    async fn separate(&self) -> Result<()>;
}

/// Crosspoint matrix between the instrument ports and the probecard pins.
#[async_trait]
pub trait SwitchMatrix: Send + Sync {
    /// Open every crosspoint.
    async fn clear(&self) -> Result<()>;
    /// Close the crosspoint joining `port` to `pin`.
    async fn connect(&self, port: Port, pin: Pin) -> Result<()>;
}

/// Source-measure unit forcing the drive current.
#[async_trait]
pub trait CurrentSource: Send + Sync {
    /// Enable the output at `current`.
    async fn force_current(&self, current: DriveCurrent) -> Result<()>;
    /// Zero and disconnect the output.
    async fn disable(&self) -> Result<()>;
}

/// Multimeter across the sense pins.
#[async_trait]
pub trait Voltmeter: Send + Sync {
    /// Take one DC voltage sample, in volts.
    async fn read_voltage(&self) -> Result<f64>;
}

/// The four endpoints a run drives.
#[derive(Clone)]
pub struct Instruments {
    /// Chuck and stage
    pub stage: Arc<dyn ProbeStage>,
    /// Switch matrix
    pub matrix: Arc<dyn SwitchMatrix>,
    /// Current source
    pub source: Arc<dyn CurrentSource>,
    /// Voltmeter
    pub voltmeter: Arc<dyn Voltmeter>,
}

/// Open the configured bus and bring up every instrument on it.
pub async fn connect(
    config: &BusConfig,
    timing: &TimingConfig,
    delay: Arc<dyn Delay>,
) -> Result<Instruments> {
    let bus = match config.backend {
        BusBackend::Simulated => {
            info!(voltage = config.simulated_voltage, "Using simulated instrument bus");
            shared(simulated::SimulatedBus::new().with_reply(
                config.dmm_address,
                format!("{:E}\r", config.simulated_voltage),
            ))
        }
        BusBackend::Prologix => open_prologix(config).await?,
    };
    let bus_name = bus.lock().await.name().to_string();

    let stage = pa200::Pa200Stage::new(
        BusEndpoint::new(bus.clone(), config.stage_address, "stage"),
        delay,
        Duration::from_millis(timing.stage_command_gap_ms),
    );
    let matrix =
        hp4084::Hp4084Matrix::new(BusEndpoint::new(bus.clone(), config.matrix_address, "matrix"));
    let source = hp4142::Hp4142Smu::new(BusEndpoint::new(bus.clone(), config.smu_address, "smu"));
    let dmm = hp3458::Hp3458Dmm::new(BusEndpoint::new(bus, config.dmm_address, "dmm"));
    dmm.initialize()
        .await
        .context("Multimeter initialisation failed")?;

    info!(
        bus = %bus_name,
        stage = config.stage_address,
        matrix = config.matrix_address,
        smu = config.smu_address,
        dmm = config.dmm_address,
        "Instruments connected"
    );

    Ok(Instruments {
        stage: Arc::new(stage),
        matrix: Arc::new(matrix),
        source: Arc::new(source),
        voltmeter: Arc::new(dmm),
    })
}

#[cfg(feature = "instrument_serial")]
async fn open_prologix(config: &BusConfig) -> Result<SharedBus> {
    let adapter = prologix::PrologixAdapter::open(
        &config.port,
        config.baud_rate,
        Duration::from_millis(config.timeout_ms),
    )
    .await?;
    Ok(shared(adapter))
}

#[cfg(not(feature = "instrument_serial"))]
async fn open_prologix(config: &BusConfig) -> Result<SharedBus> {
    Err(bus::BusError::Unavailable(format!(
        "GPIB controller on '{}' needs the instrument_serial feature",
        config.port
    ))
    .into())
}
