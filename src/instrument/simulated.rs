//! In-process bus for rehearsal and tests.
//!
//! Records every command and answers reads from canned per-address replies.

use super::bus::{BusAdapter, BusError};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One command seen by the simulated bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCommand {
    /// GPIB address
    pub address: u8,
    /// Command text
    pub command: String,
}

/// Shared handle on the commands a [`SimulatedBus`] has seen.
#[derive(Debug, Clone, Default)]
pub struct BusLog {
    commands: Arc<Mutex<Vec<BusCommand>>>,
}

impl BusLog {
    /// Every command, in send order.
    pub fn commands(&self) -> Vec<BusCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commands sent to one address.
    pub fn sent_to(&self, address: u8) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.address == address)
            .map(|c| c.command)
            .collect()
    }

    fn push(&self, command: BusCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

/// In-process bus that records commands and answers reads from canned
/// replies.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    log: BusLog,
    replies: HashMap<u8, String>,
}

impl SimulatedBus {
    /// Bus with no replies configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply returned for every read from `address`.
    pub fn with_reply(mut self, address: u8, reply: impl Into<String>) -> Self {
        self.replies.insert(address, reply.into());
        self
    }

    /// Handle on the command log, valid after the bus is shared.
    pub fn log(&self) -> BusLog {
        self.log.clone()
    }
}

#[async_trait]
impl BusAdapter for SimulatedBus {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn send(&mut self, address: u8, command: &str) -> Result<()> {
        self.log.push(BusCommand {
            address,
            command: command.to_string(),
        });
        Ok(())
    }

    async fn read_until(&mut self, address: u8, terminator: char) -> Result<String> {
        let reply = self
            .replies
            .get(&address)
            .ok_or(BusError::NoResponse(address))?;
        Ok(reply
            .split(terminator)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
