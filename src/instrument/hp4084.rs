//! Switching matrix controller.

use super::bus::BusEndpoint;
use super::SwitchMatrix;
use crate::recipes::{Pin, Port};
use anyhow::Result;
use async_trait::async_trait;

/// HP 4084B switching matrix.
pub struct Hp4084Matrix {
    endpoint: BusEndpoint,
}

impl Hp4084Matrix {
    /// Driver for the matrix at `endpoint`.
    pub fn new(endpoint: BusEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl SwitchMatrix for Hp4084Matrix {
    async fn clear(&self) -> Result<()> {
        self.endpoint.send("CL").await
    }

    async fn connect(&self, port: Port, pin: Pin) -> Result<()> {
        self.endpoint
            .send(&format!("PC{}ON{:02}", port.number(), pin.number()))
            .await
    }
}
