//! Prologix-style GPIB-USB controller on a serial port.
//!
//! The controller is put in controller mode with read-after-write disabled.
//! `++addr N` selects the listener before each command when the target
//! changes, and `++read <char>` asks the addressed talker for a reply up to
//! the terminator.

use super::bus::{BusAdapter, BusError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serialport::SerialPort;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Prologix GPIB-USB controller on a serial port.
pub struct PrologixAdapter {
    port_name: String,
    timeout: Duration,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    selected: Option<u8>,
}

impl PrologixAdapter {
    /// Open the port and put the controller in controller mode with
    /// manual read-after-write.
    pub async fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| {
                format!(
                    "Failed to open GPIB controller on '{}' at {} baud",
                    port_name, baud_rate
                )
            })?;

        let mut adapter = Self {
            port_name: port_name.to_string(),
            timeout,
            port: Arc::new(Mutex::new(port)),
            selected: None,
        };
        adapter.write_line("++mode 1").await?;
        adapter.write_line("++auto 0").await?;
        adapter.write_line("++eoi 1").await?;
        debug!(port = port_name, baud_rate, "GPIB controller ready");
        Ok(adapter)
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self.port.clone();
        let payload = format!("{}\n", line);
        tokio::task::spawn_blocking(move || -> Result<()> {
            use std::io::Write;

            let mut port = port.blocking_lock();
            port.write_all(payload.as_bytes())
                .context("Failed to write to serial port")?;
            port.flush().context("Failed to flush serial port")?;
            Ok(())
        })
        .await
        .context("Serial I/O task panicked")?
    }

    async fn select(&mut self, address: u8) -> Result<()> {
        if self.selected != Some(address) {
            self.write_line(&format!("++addr {}", address)).await?;
            self.selected = Some(address);
        }
        Ok(())
    }
}

#[async_trait]
impl BusAdapter for PrologixAdapter {
    fn name(&self) -> &str {
        &self.port_name
    }

    async fn send(&mut self, address: u8, command: &str) -> Result<()> {
        self.select(address).await?;
        self.write_line(command).await
    }

    async fn read_until(&mut self, address: u8, terminator: char) -> Result<String> {
        let terminator =
            u8::try_from(terminator).context("Read terminator must be a single byte")?;
        self.select(address).await?;
        self.write_line(&format!("++read {}", terminator)).await?;

        let port = self.port.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || -> Result<String> {
            use std::io::Read;

            let mut port = port.blocking_lock();
            let mut response = Vec::new();
            let mut byte = [0u8; 1];
            let start = Instant::now();

            loop {
                if start.elapsed() > timeout {
                    return Err(BusError::Timeout(timeout).into());
                }
                match port.read(&mut byte) {
                    Ok(0) => return Err(BusError::NoResponse(address).into()),
                    Ok(_) if byte[0] == terminator => break,
                    Ok(_) => response.push(byte[0]),
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => return Err(e).context("Failed to read from serial port"),
                }
            }

            Ok(String::from_utf8_lossy(&response).trim().to_string())
        })
        .await
        .context("Serial I/O task panicked")?
    }
}
