//! Structure coordinate table.
//!
//! A coordinate table is a CSV file with a header row. Every row describes one
//! test structure: its layout position in microns (`x`, `y`) plus any number of
//! descriptive columns (`material`, `structure`, `block`, ...) used for
//! filtering and recipe selection.
//!
//! ```text
//! x,y,material,structure,block
//! 0,0,Pt,LW300,1
//! 100,50,Pt,LW300,1
//! ```

use crate::error::{AppResult, ProbeError};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::debug;

/// Column holding the structure type tag.
pub const STRUCTURE_COLUMN: &str = "structure";
/// Column holding the material name.
pub const MATERIAL_COLUMN: &str = "material";
/// Column holding the block number.
pub const BLOCK_COLUMN: &str = "block";

/// A single cell of the coordinate table.
///
/// Cells are typed on load: integers stay integers so that filters such as
/// `block in [3, 6, 10]` compare exactly, anything else numeric becomes a float
/// and the remainder is kept as text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Whole number cell.
    Int(i64),
    /// Any other numeric cell.
    Float(f64),
    /// Non-numeric cell, trimmed.
    Text(String),
}

impl FieldValue {
    /// Parse a raw CSV cell.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<i64>() {
            FieldValue::Int(value)
        } else if let Ok(value) = raw.parse::<f64>() {
            FieldValue::Float(value)
        } else {
            FieldValue::Text(raw.to_string())
        }
    }

    /// Numeric value, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(value) => Some(*value as f64),
            FieldValue::Float(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }

    /// Total ordering used for `order_by`: numbers before text, numbers by
    /// value, text lexically.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(value) => write!(f, "{}", value),
            FieldValue::Float(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One row of the coordinate table.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureRecord {
    /// Position of the row in the loaded table. Stable for the whole run and
    /// used to pick the home structure.
    pub index: usize,
    /// Layout x coordinate in microns
    pub x: f64,
    /// Layout y coordinate in microns
    pub y: f64,
    fields: BTreeMap<String, FieldValue>,
}

impl StructureRecord {
    /// Create a record with only its position set.
    pub fn new(index: usize, x: f64, y: f64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), FieldValue::Float(x));
        fields.insert("y".to_string(), FieldValue::Float(y));
        Self {
            index,
            x,
            y,
            fields,
        }
    }

    /// Add a descriptive column value.
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Column value, `None` when the column is absent.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// All columns of the row, including `x` and `y`.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Column rendered as text, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.field(name).map(ToString::to_string).unwrap_or_default()
    }

    /// Structure type tag, e.g. `LW300`.
    pub fn structure_tag(&self) -> String {
        self.text(STRUCTURE_COLUMN)
    }

    /// Material name, e.g. `Pt`.
    pub fn material(&self) -> String {
        self.text(MATERIAL_COLUMN)
    }

    /// Block number as written.
    pub fn block(&self) -> String {
        self.text(BLOCK_COLUMN)
    }
}

/// The full, unfiltered coordinate table.
#[derive(Debug, Clone, Default)]
pub struct StructureTable {
    columns: Vec<String>,
    records: Vec<StructureRecord>,
}

impl StructureTable {
    /// Build a table from records that are already in memory.
    ///
    /// Records are re-indexed by position.
    pub fn from_records(records: Vec<StructureRecord>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let records = records
            .into_iter()
            .enumerate()
            .map(|(index, mut record)| {
                record.index = index;
                for (name, _) in record.fields() {
                    if !columns.iter().any(|c| c == name) {
                        columns.push(name.to_string());
                    }
                }
                record
            })
            .collect();
        Self { columns, records }
    }

    /// Load a coordinate table from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| ProbeError::CoordinateFile {
                path: path.display().to_string(),
                source,
            })?;
        let table = Self::read(reader, &path.display().to_string())?;
        debug!(
            path = %path.display(),
            structures = table.len(),
            "Loaded coordinate table"
        );
        Ok(table)
    }

    /// Parse a coordinate table from any CSV source.
    pub fn from_reader<R: io::Read>(source: R) -> AppResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self::read(reader, "<reader>")
    }

    fn read<R: io::Read>(mut reader: csv::Reader<R>, name: &str) -> AppResult<Self> {
        let columns: Vec<String> = reader
            .headers()
            .map_err(|source| ProbeError::CoordinateFile {
                path: name.to_string(),
                source,
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let x_col = column_position(&columns, "x")?;
        let y_col = column_position(&columns, "y")?;

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|source| ProbeError::CoordinateFile {
                path: name.to_string(),
                source,
            })?;
            let x = numeric_cell(&row, x_col, index, "x")?;
            let y = numeric_cell(&row, y_col, index, "y")?;

            let mut record = StructureRecord::new(index, x, y);
            for (column, cell) in columns.iter().zip(row.iter()) {
                if column == "x" || column == "y" {
                    continue;
                }
                record.fields.insert(column.clone(), FieldValue::parse(cell));
            }
            records.push(record);
        }

        Ok(Self { columns, records })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row by table index.
    pub fn get(&self, index: usize) -> Option<&StructureRecord> {
        self.records.get(index)
    }

    /// All rows in table order.
    pub fn records(&self) -> &[StructureRecord] {
        &self.records
    }

    /// Header names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True when the header names `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

fn column_position(columns: &[String], name: &str) -> AppResult<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| ProbeError::MissingColumn(name.to_string()))
}

fn numeric_cell(row: &csv::StringRecord, column: usize, index: usize, name: &str) -> AppResult<f64> {
    let raw = row.get(column).unwrap_or("");
    let value = raw.parse::<f64>().map_err(|_| ProbeError::CoordinateRow {
        row: index,
        reason: format!("'{}' value '{}' is not a number", name, raw),
    })?;
    if !value.is_finite() {
        return Err(ProbeError::CoordinateRow {
            row: index,
            reason: format!("'{}' value '{}' is not finite", name, raw),
        });
    }
    Ok(value)
}
