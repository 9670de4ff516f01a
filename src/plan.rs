//! Visit list construction.
//!
//! Everything that can be rejected about the input is rejected here, before a
//! result file is opened or the stage moves: the home index is checked against
//! the full table, relative coordinates are computed before filtering, then
//! the filter, ordering and start offset are applied in that order.

use crate::coordinates::{HomeReference, RelativeCoordinate, StructureRecord, StructureTable};
use crate::error::{AppResult, ProbeError};
use crate::filter::{order_by, StructureFilter};
use tracing::{debug, info};

/// Selection options for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Index of the home structure in the unfiltered table.
    pub home_index: usize,
    /// Selection predicate; `None` visits every structure.
    pub filter: Option<String>,
    /// Columns to sort the selection by, most significant first.
    pub order_by: Vec<String>,
    /// Number of leading structures to skip.
    pub offset: usize,
}

/// A structure queued for measurement and where to move to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStructure {
    /// Position in the filtered and ordered selection, counted before the
    /// start offset is applied. This is the index written to the result file
    /// and the value `offset` resumes from.
    pub position: usize,
    /// Source row in the coordinate table.
    pub record: StructureRecord,
    /// Stage move from home to this structure.
    pub relative: RelativeCoordinate,
}

/// The structures a run visits, in visiting order.
#[derive(Debug, Clone)]
pub struct MeasurementPlan {
    home: HomeReference,
    visits: Vec<PlannedStructure>,
    skipped: usize,
}

impl MeasurementPlan {
    /// Validate `options` against `table` and build the visit list.
    pub fn build(table: &StructureTable, options: &PlanOptions) -> AppResult<Self> {
        let home = HomeReference::select(table, options.home_index)?;

        if let Some(column) = options.order_by.iter().find(|c| !table.has_column(c)) {
            return Err(ProbeError::UnknownOrderColumn(column.clone()));
        }

        let mut selected: Vec<&StructureRecord> = match &options.filter {
            Some(expression) => StructureFilter::compile(expression)?.apply(table.records())?,
            None => table.records().iter().collect(),
        };
        order_by(&mut selected, &options.order_by);

        let total = selected.len();
        if options.offset >= total {
            return Err(ProbeError::OffsetOutOfRange {
                offset: options.offset,
                len: total,
            });
        }

        let visits: Vec<PlannedStructure> = selected
            .into_iter()
            .enumerate()
            .skip(options.offset)
            .map(|(position, record)| PlannedStructure {
                position,
                record: record.clone(),
                relative: home.relative(record),
            })
            .collect();

        debug!(
            home = home.index(),
            selected = total,
            offset = options.offset,
            "Measurement plan built"
        );
        info!(
            structures = visits.len(),
            "{} structures to visit", visits.len()
        );

        Ok(Self {
            home,
            visits,
            skipped: options.offset,
        })
    }

    /// The home structure.
    pub fn home(&self) -> &HomeReference {
        &self.home
    }

    /// Structures to visit, offset already applied.
    pub fn visits(&self) -> &[PlannedStructure] {
        &self.visits
    }

    /// Structures dropped by the start offset.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of structures to visit.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Never true for a built plan.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}
