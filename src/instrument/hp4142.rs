//! Modular DC source/monitor, driven as a current source on channel 1.

use super::bus::BusEndpoint;
use super::CurrentSource;
use crate::recipes::DriveCurrent;
use anyhow::Result;
use async_trait::async_trait;

const CHANNEL: u8 = 1;
/// Auto range
const RANGE: u8 = 0;
/// Voltage compliance in volts
const COMPLIANCE: u8 = 10;

/// HP 4142B source-measure unit, channel 1.
pub struct Hp4142Smu {
    endpoint: BusEndpoint,
}

impl Hp4142Smu {
    /// Driver for the SMU at `endpoint`.
    pub fn new(endpoint: BusEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl CurrentSource for Hp4142Smu {
    async fn force_current(&self, current: DriveCurrent) -> Result<()> {
        self.endpoint.send(&format!("CN{}", CHANNEL)).await?;
        self.endpoint
            .send(&format!("DI{},{},{},{}", CHANNEL, RANGE, current, COMPLIANCE))
            .await
    }

    async fn disable(&self) -> Result<()> {
        self.endpoint.send(&format!("DZ{}", CHANNEL)).await
    }
}
