//! GPIB bus abstraction.
//!
//! Every instrument shares one bus. Commands are addressed by GPIB primary
//! address and serialized through a single async mutex, so a command and its
//! reply are never interleaved with traffic for another instrument.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::trace;

/// Bus-level failures.
#[derive(Error, Debug)]
pub enum BusError {
    /// Nothing is listening at the address.
    #[error("No response from GPIB address {0}")]
    NoResponse(u8),
    /// A read did not finish in time.
    #[error("Bus read timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The configured backend cannot be opened.
    #[error("Bus backend unavailable: {0}")]
    Unavailable(String),
}

/// Low-level transport to instruments on the bus.
#[async_trait]
pub trait BusAdapter: Send {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Write one command to the instrument at `address`.
    async fn send(&mut self, address: u8, command: &str) -> Result<()>;

    /// Read from `address` until `terminator`. The terminator is not returned.
    async fn read_until(&mut self, address: u8, terminator: char) -> Result<String>;

    /// Write a command and read a newline-terminated reply.
    async fn query(&mut self, address: u8, command: &str) -> Result<String> {
        self.send(address, command).await?;
        self.read_until(address, '\n').await
    }
}

/// The bus as shared by every endpoint.
pub type SharedBus = Arc<Mutex<dyn BusAdapter>>;

/// Wrap an adapter for sharing.
pub fn shared<B: BusAdapter + 'static>(bus: B) -> SharedBus {
    Arc::new(Mutex::new(bus))
}

/// One instrument's view of the shared bus.
#[derive(Clone)]
pub struct BusEndpoint {
    bus: SharedBus,
    address: u8,
    label: &'static str,
}

impl BusEndpoint {
    /// `label` names the instrument in logs and error context.
    pub fn new(bus: SharedBus, address: u8, label: &'static str) -> Self {
        Self {
            bus,
            address,
            label,
        }
    }

    /// Write one command without waiting for a reply.
    pub async fn send(&self, command: &str) -> Result<()> {
        trace!(instrument = self.label, address = self.address, command, "bus send");
        let mut bus = self.bus.lock().await;
        bus.send(self.address, command).await.with_context(|| {
            format!(
                "{} (GPIB {}): command '{}' failed",
                self.label, self.address, command
            )
        })
    }

    /// Send a command and read the reply under one bus lock.
    pub async fn transact(&self, command: &str, terminator: char) -> Result<String> {
        trace!(instrument = self.label, address = self.address, command, "bus transact");
        let mut bus = self.bus.lock().await;
        bus.send(self.address, command).await.with_context(|| {
            format!(
                "{} (GPIB {}): command '{}' failed",
                self.label, self.address, command
            )
        })?;
        let reply = bus
            .read_until(self.address, terminator)
            .await
            .with_context(|| {
                format!(
                    "{} (GPIB {}): no reply to '{}'",
                    self.label, self.address, command
                )
            })?;
        trace!(instrument = self.label, reply = %reply, "bus reply");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::simulated::SimulatedBus;

    #[tokio::test]
    async fn test_endpoint_addresses_commands() {
        let sim = SimulatedBus::new();
        let log = sim.log();
        let bus = shared(sim);
        let stage = BusEndpoint::new(bus.clone(), 1, "stage");
        let matrix = BusEndpoint::new(bus, 22, "matrix");

        stage.send("39").await.unwrap();
        matrix.send("CL").await.unwrap();

        let sent = log.commands();
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[0].address, sent[0].command.as_str()), (1, "39"));
        assert_eq!((sent[1].address, sent[1].command.as_str()), (22, "CL"));
    }

    #[tokio::test]
    async fn test_missing_reply_carries_instrument_context() {
        let bus = shared(SimulatedBus::new());
        let dmm = BusEndpoint::new(bus, 12, "dmm");
        let err = dmm.transact("TRIG SGL", '\r').await.unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("dmm (GPIB 12)"));
        assert!(text.contains("No response from GPIB address 12"));
    }
}
