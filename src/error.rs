//! Custom error types for the probing application.
//!
//! `ProbeError` is the single error type returned by the library. Each variant
//! belongs to one of the broad classes reported by [`ProbeError::kind`]:
//!
//! - **Configuration**: conflicting or missing run options. Raised before any
//!   instrument is touched.
//! - **Input**: problems with the coordinate table, the filter predicate or the
//!   home/offset indices. Raised before the output file is opened or the stage
//!   moves.
//! - **RecipeLookup**: a structure whose type (or material current) has no
//!   registry entry. Aborts a run in progress once the stage is separated.
//! - **Instrument**: bus or driver faults. Never retried.
//! - **Output**: failures writing the result file.
//!
//! Instrument drivers speak `anyhow` internally, the orchestrator lifts those
//! errors into [`ProbeError::Instrument`].

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ProbeError>;

/// Every failure the library reports.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The figment layers could not be merged or extracted.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    /// A loaded configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Coordinate file '{path}' could not be read: {source}")]
    /// The coordinate table could not be opened or parsed as CSV.
    CoordinateFile {
        /// Table path as given.
        path: String,
        /// Underlying reader error.
        #[source]
        source: csv::Error,
    },

    /// A row whose `x` or `y` is not a finite number.
    #[error("Coordinate table row {row}: {reason}")]
    CoordinateRow {
        /// Zero-based data row.
        row: usize,
        /// What is wrong with the cell.
        reason: String,
    },

    /// A required column (`x` or `y`) is absent.
    #[error("Coordinate table is missing required column '{0}'")]
    MissingColumn(String),

    /// The predicate does not compile, names an unknown column or is not
    /// boolean.
    #[error("Malformed filter '{filter}': {reason}")]
    MalformedFilter {
        /// The predicate as supplied.
        filter: String,
        /// Compile or evaluation failure.
        reason: String,
    },

    /// The predicate selected nothing.
    #[error("Filter '{0}' did not match any structures")]
    NoStructuresMatched(String),

    /// The home row is past the end of the table.
    #[error("Home index {index} out of range for a table of {len} structures")]
    HomeIndexOutOfRange {
        /// Requested home row.
        index: usize,
        /// Rows in the table.
        len: usize,
    },

    /// The start offset skips the whole sequence.
    #[error("Start offset {offset} out of range for a sequence of {len} structures")]
    OffsetOutOfRange {
        /// Requested start offset.
        offset: usize,
        /// Structures in the filtered sequence.
        len: usize,
    },

    /// An `order_by` column is not in the table.
    #[error("Order-by column '{0}' not present in the coordinate table")]
    UnknownOrderColumn(String),

    /// No recipe is registered for the structure type.
    #[error("Structure {index}: no recipe registered for structure type '{tag}'")]
    UnknownStructureType {
        /// Table row of the structure.
        index: usize,
        /// Structure type as written in the table.
        tag: String,
    },

    /// The recipe has no drive current for the material.
    #[error("Structure {index}: no drive current for material '{material}' ({class})")]
    UnknownCurrent {
        /// Table row of the structure.
        index: usize,
        /// Material as written in the table.
        material: String,
        /// Measurement class of the step.
        class: String,
    },

    /// A bus or driver fault.
    #[error("Instrument error: {0:#}")]
    Instrument(anyhow::Error),

    /// The result file exists and neither overwrite nor append was asked for.
    #[error("Output file '{path}' already exists. Use overwrite or append to reuse it")]
    OutputExists {
        /// Result file path.
        path: String,
    },

    /// Writing a result row failed.
    #[error("Result file error: {0}")]
    Output(#[from] csv::Error),

    /// Any other file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad error classes used for reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Conflicting or missing run options.
    Configuration,
    /// Bad coordinate table, filter, home or offset.
    Input,
    /// Unregistered structure type or material current.
    RecipeLookup,
    /// Bus or driver fault.
    Instrument,
    /// Result file failure.
    Output,
}

impl ProbeError {
    /// Class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::ConfigLoad(_) | ProbeError::Configuration(_) => ErrorKind::Configuration,
            ProbeError::CoordinateFile { .. }
            | ProbeError::CoordinateRow { .. }
            | ProbeError::MissingColumn(_)
            | ProbeError::MalformedFilter { .. }
            | ProbeError::NoStructuresMatched(_)
            | ProbeError::HomeIndexOutOfRange { .. }
            | ProbeError::OffsetOutOfRange { .. }
            | ProbeError::UnknownOrderColumn(_) => ErrorKind::Input,
            ProbeError::UnknownStructureType { .. } | ProbeError::UnknownCurrent { .. } => {
                ErrorKind::RecipeLookup
            }
            ProbeError::Instrument(_) => ErrorKind::Instrument,
            ProbeError::OutputExists { .. } | ProbeError::Output(_) | ProbeError::Io(_) => {
                ErrorKind::Output
            }
        }
    }

    pub(crate) fn instrument(err: anyhow::Error) -> Self {
        ProbeError::Instrument(err)
    }
}

impl From<figment::Error> for ProbeError {
    fn from(err: figment::Error) -> Self {
        ProbeError::ConfigLoad(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProbeError::UnknownStructureType {
            index: 4,
            tag: "LW900".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Structure 4: no recipe registered for structure type 'LW900'"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ProbeError::Configuration("both".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ProbeError::NoStructuresMatched("block == 99".into()).kind(),
            ErrorKind::Input
        );
        assert_eq!(
            ProbeError::OffsetOutOfRange { offset: 2, len: 2 }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            ProbeError::instrument(anyhow::anyhow!("bus timeout")).kind(),
            ErrorKind::Instrument
        );
    }

    #[test]
    fn test_instrument_error_keeps_context_chain() {
        let err = anyhow::anyhow!("no reply").context("DMM sample failed");
        let err = ProbeError::instrument(err);
        let text = err.to_string();
        assert!(text.contains("DMM sample failed"));
        assert!(text.contains("no reply"));
    }
}
