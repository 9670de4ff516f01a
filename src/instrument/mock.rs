//! Recording mock instruments.
//!
//! One [`MockInstruments`] value plays all four roles and records every call
//! in order into a shared log, so tests can assert on the exact command
//! sequence a run produced. Faults can be injected on the n-th call of a
//! given kind.

use super::{CurrentSource, Instruments, ProbeStage, SwitchMatrix, Voltmeter};
use crate::recipes::{DriveCurrent, Pin, Port};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentCall {
    /// `ProbeStage::translate`
    Translate {
        /// Stage x motion
        dx: f64,
        /// Stage y motion
        dy: f64,
    },
    /// `ProbeStage::contact`
    Contact,
    /// `ProbeStage::separate`
    Separate,
    /// `SwitchMatrix::clear`
    Clear,
    /// `SwitchMatrix::connect`
    Connect {
        /// Instrument side
        port: Port,
        /// Probecard side
        pin: Pin,
    },
    /// `CurrentSource::force_current`
    ForceCurrent(DriveCurrent),
    /// `CurrentSource::disable`
    Disable,
    /// `Voltmeter::read_voltage`
    ReadVoltage,
}

/// [`InstrumentCall`] without its arguments, for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// See [`InstrumentCall::Translate`]
    Translate,
    /// See [`InstrumentCall::Contact`]
    Contact,
    /// See [`InstrumentCall::Separate`]
    Separate,
    /// See [`InstrumentCall::Clear`]
    Clear,
    /// See [`InstrumentCall::Connect`]
    Connect,
    /// See [`InstrumentCall::ForceCurrent`]
    ForceCurrent,
    /// See [`InstrumentCall::Disable`]
    Disable,
    /// See [`InstrumentCall::ReadVoltage`]
    ReadVoltage,
}

impl InstrumentCall {
    /// Argument-free kind of this call.
    pub fn kind(&self) -> CallKind {
        match self {
            InstrumentCall::Translate { .. } => CallKind::Translate,
            InstrumentCall::Contact => CallKind::Contact,
            InstrumentCall::Separate => CallKind::Separate,
            InstrumentCall::Clear => CallKind::Clear,
            InstrumentCall::Connect { .. } => CallKind::Connect,
            InstrumentCall::ForceCurrent(_) => CallKind::ForceCurrent,
            InstrumentCall::Disable => CallKind::Disable,
            InstrumentCall::ReadVoltage => CallKind::ReadVoltage,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    kind: CallKind,
    occurrence: usize,
}

/// Recording stand-in for all four instruments.
#[derive(Clone)]
pub struct MockInstruments {
    calls: Arc<Mutex<Vec<InstrumentCall>>>,
    voltage: f64,
    fault: Option<Fault>,
}

impl Default for MockInstruments {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInstruments {
    /// Mock reading 1 mV with no faults.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            voltage: 1.0e-3,
            fault: None,
        }
    }

    /// Voltage returned by every sample.
    pub fn with_voltage(mut self, voltage: f64) -> Self {
        self.voltage = voltage;
        self
    }

    /// Fail the `occurrence`-th (1-based) call of `kind`.
    pub fn with_fault(mut self, kind: CallKind, occurrence: usize) -> Self {
        self.fault = Some(Fault { kind, occurrence });
        self
    }

    /// Hand out the four endpoints, all backed by this mock.
    pub fn instruments(&self) -> Instruments {
        let shared = Arc::new(self.clone());
        Instruments {
            stage: shared.clone(),
            matrix: shared.clone(),
            source: shared.clone(),
            voltmeter: shared,
        }
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<InstrumentCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls of `kind`.
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    fn record(&self, call: InstrumentCall) -> Result<()> {
        let kind = call.kind();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.push(call);
        let seen = calls.iter().filter(|c| c.kind() == kind).count();
        match self.fault {
            Some(fault) if fault.kind == kind && fault.occurrence == seen => {
                bail!("injected {:?} fault on call {}", kind, seen)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProbeStage for MockInstruments {
    async fn translate(&self, dx: f64, dy: f64) -> Result<()> {
        self.record(InstrumentCall::Translate { dx, dy })
    }

    async fn contact(&self) -> Result<()> {
        self.record(InstrumentCall::Contact)
    }

    async fn separate(&self) -> Result<()> {
        self.record(InstrumentCall::Separate)
    }
}

#[async_trait]
impl SwitchMatrix for MockInstruments {
    async fn clear(&self) -> Result<()> {
        self.record(InstrumentCall::Clear)
    }

    async fn connect(&self, port: Port, pin: Pin) -> Result<()> {
        self.record(InstrumentCall::Connect { port, pin })
    }
}

#[async_trait]
impl CurrentSource for MockInstruments {
    async fn force_current(&self, current: DriveCurrent) -> Result<()> {
        self.record(InstrumentCall::ForceCurrent(current))
    }

    async fn disable(&self) -> Result<()> {
        self.record(InstrumentCall::Disable)
    }
}

#[async_trait]
impl Voltmeter for MockInstruments {
    async fn read_voltage(&self) -> Result<f64> {
        self.record(InstrumentCall::ReadVoltage)?;
        Ok(self.voltage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_are_shared_between_roles() {
        let mock = MockInstruments::new().with_voltage(2.5);
        let instruments = mock.instruments();

        instruments.stage.contact().await.unwrap();
        instruments.matrix.clear().await.unwrap();
        let v = instruments.voltmeter.read_voltage().await.unwrap();

        assert_eq!(v, 2.5);
        assert_eq!(
            mock.calls(),
            vec![
                InstrumentCall::Contact,
                InstrumentCall::Clear,
                InstrumentCall::ReadVoltage
            ]
        );
    }

    #[tokio::test]
    async fn test_fault_on_nth_call() {
        let mock = MockInstruments::new().with_fault(CallKind::Separate, 2);
        let stage = mock.instruments().stage;

        assert!(stage.separate().await.is_ok());
        assert!(stage.separate().await.is_err());
        assert!(stage.separate().await.is_ok());
        assert_eq!(mock.count(CallKind::Separate), 3);
    }
}
