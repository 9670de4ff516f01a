//! Digital multimeter used as the voltmeter, held in single-trigger mode.

use super::bus::BusEndpoint;
use super::Voltmeter;
use anyhow::{Context, Result};
use async_trait::async_trait;

const SETUP: [&str; 4] = ["PRESET NORM", "TRIG HOLD", "DCV 10", "NPLC 1"];

/// HP 3458A multimeter.
pub struct Hp3458Dmm {
    endpoint: BusEndpoint,
}

impl Hp3458Dmm {
    /// Driver for the meter at `endpoint`.
    pub fn new(endpoint: BusEndpoint) -> Self {
        Self { endpoint }
    }

    /// DC volts, 10 V range, 1 PLC integration, triggered on demand.
    pub async fn initialize(&self) -> Result<()> {
        for command in SETUP {
            self.endpoint.send(command).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Voltmeter for Hp3458Dmm {
    async fn read_voltage(&self) -> Result<f64> {
        let reply = self.endpoint.transact("TRIG SGL", '\r').await?;
        reply
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Unparseable voltage reading '{}'", reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::bus::shared;
    use crate::instrument::simulated::SimulatedBus;

    #[tokio::test]
    async fn test_initialize_and_sample() {
        let sim = SimulatedBus::new().with_reply(12, " 1.234500000E-02\r\n");
        let log = sim.log();
        let dmm = Hp3458Dmm::new(BusEndpoint::new(shared(sim), 12, "dmm"));

        dmm.initialize().await.unwrap();
        let volts = dmm.read_voltage().await.unwrap();

        assert_eq!(volts, 1.2345e-2);
        assert_eq!(
            log.sent_to(12),
            vec!["PRESET NORM", "TRIG HOLD", "DCV 10", "NPLC 1", "TRIG SGL"]
        );
    }

    #[tokio::test]
    async fn test_garbage_reading_is_an_error() {
        let sim = SimulatedBus::new().with_reply(12, "OVLD\r");
        let dmm = Hp3458Dmm::new(BusEndpoint::new(shared(sim), 12, "dmm"));
        let err = dmm.read_voltage().await.unwrap_err();
        assert!(err.to_string().contains("OVLD"));
    }
}
