//! Probe station stage controller.
//!
//! The controller wants a pause before every command; it is taken from the
//! injected delay policy so tests run without sleeping.

use super::bus::BusEndpoint;
use super::ProbeStage;
use crate::timing::Delay;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const TRANSLATE: &str = "34";
const CONTACT: &str = "37";
const SEPARATE: &str = "39";

/// Cascade PA200 probe station.
pub struct Pa200Stage {
    endpoint: BusEndpoint,
    delay: Arc<dyn Delay>,
    command_gap: Duration,
}

impl Pa200Stage {
    /// Every command waits `command_gap` first; the controller drops
    /// commands that arrive back to back.
    pub fn new(endpoint: BusEndpoint, delay: Arc<dyn Delay>, command_gap: Duration) -> Self {
        Self {
            endpoint,
            delay,
            command_gap,
        }
    }

    async fn command(&self, command: &str) -> Result<()> {
        self.delay.wait(self.command_gap).await;
        self.endpoint.send(command).await
    }
}

#[async_trait]
impl ProbeStage for Pa200Stage {
    async fn translate(&self, dx: f64, dy: f64) -> Result<()> {
        self.command(&format!("{} {} {} H", TRANSLATE, dx, dy)).await
    }

    async fn contact(&self) -> Result<()> {
        self.command(CONTACT).await
    }

    async fn separate(&self) -> Result<()> {
        self.command(SEPARATE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::bus::shared;
    use crate::instrument::simulated::SimulatedBus;
    use crate::timing::TrackingDelay;

    #[tokio::test]
    async fn test_stage_commands() {
        let sim = SimulatedBus::new();
        let log = sim.log();
        let delay = TrackingDelay::new();
        let stage = Pa200Stage::new(
            BusEndpoint::new(shared(sim), 1, "stage"),
            Arc::new(delay.clone()),
            Duration::from_millis(500),
        );

        stage.separate().await.unwrap();
        stage.translate(-100.0, 50.5).await.unwrap();
        stage.contact().await.unwrap();

        assert_eq!(log.sent_to(1), vec!["39", "34 -100 50.5 H", "37"]);
        assert_eq!(delay.count(), 3);
        assert_eq!(delay.total(), Duration::from_millis(1500));
    }
}
