//! Layout coordinates to stage motions.
//!
//! The prober moves the sample under a fixed probe card and microscope, so a
//! displacement in layout space appears reversed at the stage. Both the
//! structure and the home position are first negated into the stage frame and
//! home is then subtracted:
//!
//! ```text
//! relative(s) = (-s.x, -s.y) - (-home.x, -home.y)
//! ```
//!
//! The stage is expected to sit over the home structure (with the prober's
//! `SET HOME` applied) when a run starts.

use super::table::{StructureRecord, StructureTable};
use crate::error::{AppResult, ProbeError};
use std::fmt;

/// Stage motion, in microns, from home to a structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeCoordinate {
    /// Stage x motion.
    pub dx: f64,
    /// Stage y motion.
    pub dy: f64,
}

impl fmt::Display for RelativeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.dx, self.dy)
    }
}

/// The structure used as stage origin.
///
/// Selected from the full table, before any filtering, so that the origin does
/// not depend on which subset of structures is visited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeReference {
    index: usize,
    stage_x: f64,
    stage_y: f64,
}

impl HomeReference {
    /// Select the home structure by its table index.
    pub fn select(table: &StructureTable, index: usize) -> AppResult<Self> {
        let record = table.get(index).ok_or(ProbeError::HomeIndexOutOfRange {
            index,
            len: table.len(),
        })?;
        Ok(Self::from_record(record))
    }

    /// Use `record` as home.
    pub fn from_record(record: &StructureRecord) -> Self {
        let (stage_x, stage_y) = stage_frame(record.x, record.y);
        Self {
            index: record.index,
            stage_x,
            stage_y,
        }
    }

    /// Table index of the home structure.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stage motion that brings the probes from home over `record`.
    pub fn relative(&self, record: &StructureRecord) -> RelativeCoordinate {
        let (x, y) = stage_frame(record.x, record.y);
        RelativeCoordinate {
            dx: x - self.stage_x,
            dy: y - self.stage_y,
        }
    }
}

fn stage_frame(x: f64, y: f64) -> (f64, f64) {
    (-x, -y)
}

/// Relative coordinates for every structure in the table, in table order.
pub fn relative_coordinates(
    table: &StructureTable,
    home_index: usize,
) -> AppResult<Vec<RelativeCoordinate>> {
    let home = HomeReference::select(table, home_index)?;
    Ok(table.records().iter().map(|r| home.relative(r)).collect())
}
