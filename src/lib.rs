//! Automated four-terminal resistance probing of wafer test structures.
//!
//! A run loads a structure coordinate table, anchors it to a home structure,
//! selects and orders the structures to visit, then for each one moves the
//! probe stage, touches down and steps through the measurement recipe for its
//! structure type: program the switch matrix, force a current, sample the
//! voltage and record the resistance.
//!
//! The sequencing core ([`orchestrator`]) only depends on the capability
//! traits in [`instrument`], so it runs unchanged against GPIB hardware, the
//! simulated bus or recording mocks.

pub mod cli;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod filter;
pub mod instrument;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod recipes;
pub mod session;
pub mod sink;
pub mod timing;

pub use config::{ProbeConfig, RunMode};
pub use error::{AppResult, ErrorKind, ProbeError};
pub use orchestrator::{Orchestrator, RunSummary};
pub use session::Session;
