//! Structure selection with Rhai predicates.
//!
//! A filter is a Rhai expression evaluated once per coordinate-table row with
//! every column bound as a constant of the same name. The expression must
//! produce a boolean.
//!
//! ```text
//! material == "Pt"
//! block in [3, 6, 10]
//! structure in ["LW300", "LW600"] && (block == 4 || material == "Ag_Cl")
//! ```
//!
//! Anything that fails to compile, references a column the table does not
//! have, or yields a non-boolean value is reported as a malformed filter. A
//! well-formed filter that selects nothing is a separate error.

use crate::coordinates::{FieldValue, StructureRecord};
use crate::error::{AppResult, ProbeError};
use rhai::{Dynamic, Engine, Scope, AST};
use std::cmp::Ordering;
use tracing::debug;

/// Filter applied when filtering is enabled without an explicit expression:
/// platinum 300 um linewidth structures.
pub const DEFAULT_FILTER: &str = r#"structure == "LW300" && material == "Pt""#;

const MAX_OPERATIONS: u64 = 10_000;

/// A compiled structure predicate.
pub struct StructureFilter {
    expression: String,
    engine: Engine,
    ast: AST,
}

impl StructureFilter {
    /// Compile a predicate expression.
    pub fn compile(expression: &str) -> AppResult<Self> {
        let mut engine = Engine::new();

        // A predicate is one expression per row; cap the work it may do
        engine.on_progress(|count| {
            if count > MAX_OPERATIONS {
                Some(format!("Safety limit exceeded: maximum {} operations", MAX_OPERATIONS).into())
            } else {
                None
            }
        });

        let ast = engine.compile_expression(expression).map_err(|e| {
            let mut reason = e.to_string();
            if uses_word_operators(expression) {
                reason.push_str("; combine terms with &&, || and ! instead of and, or, not");
            }
            malformed(expression, reason)
        })?;

        Ok(Self {
            expression: expression.to_string(),
            engine,
            ast,
        })
    }

    /// Source text of the predicate.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate the predicate against one structure.
    pub fn matches(&self, record: &StructureRecord) -> AppResult<bool> {
        let mut scope = Scope::new();
        for (name, value) in record.fields() {
            scope.push_constant_dynamic(name, to_dynamic(value));
        }

        self.engine
            .eval_ast_with_scope::<bool>(&mut scope, &self.ast)
            .map_err(|e| malformed(&self.expression, e.to_string()))
    }

    /// Keep the structures matching the predicate, in table order.
    ///
    /// Fails when nothing matches.
    pub fn apply<'a, I>(&self, records: I) -> AppResult<Vec<&'a StructureRecord>>
    where
        I: IntoIterator<Item = &'a StructureRecord>,
    {
        let mut selected = Vec::new();
        for record in records {
            if self.matches(record)? {
                selected.push(record);
            }
        }

        if selected.is_empty() {
            return Err(ProbeError::NoStructuresMatched(self.expression.clone()));
        }

        debug!(filter = %self.expression, selected = selected.len(), "Applied structure filter");
        Ok(selected)
    }
}

/// Stable sort of a structure sequence by one or more columns.
///
/// Rows lacking a column sort after rows that have it.
pub fn order_by(records: &mut [&StructureRecord], columns: &[String]) {
    if columns.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for column in columns {
            let ordering = match (a.field(column), b.field(column)) {
                (Some(x), Some(y)) => x.sort_cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn to_dynamic(value: &FieldValue) -> Dynamic {
    match value {
        FieldValue::Int(v) => Dynamic::from(*v),
        FieldValue::Float(v) => Dynamic::from(*v),
        FieldValue::Text(v) => Dynamic::from(v.clone()),
    }
}

fn uses_word_operators(expression: &str) -> bool {
    expression
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|word| matches!(word, "and" | "or" | "not"))
}

fn malformed(expression: &str, reason: String) -> ProbeError {
    ProbeError::MalformedFilter {
        filter: expression.to_string(),
        reason,
    }
}
