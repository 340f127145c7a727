//! Decoded Table Model

use crate::error::ValidationError;
use std::fmt;

/// Cell tokens read as missing values
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Missing,
}

impl Scalar {
    /// Classify a raw cell
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS.contains(&trimmed) {
            return Scalar::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Scalar::Number(value),
            Err(_) => Scalar::Text(trimmed.to_string()),
        }
    }

    /// Numeric value, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the cell is missing
    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Scalar::Number(value) => write!(f, "{}", value),
            Scalar::Text(text) => f.write_str(text),
            Scalar::Missing => Ok(()),
        }
    }
}

/// Ordered rows sharing one header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl RawTable {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Vec<Scalar>) -> Result<(), ValidationError> {
        if row.len() != self.columns.len() {
            return Err(ValidationError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in header order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether the table has a column
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A column as a numeric series; text cells read as null
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_number()).collect())
    }

    /// Iterate rows in order
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a RawTable,
    index: usize,
}

impl<'a> RowView<'a> {
    /// Zero-based row position in the table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cell for a column
    pub fn get(&self, column: &str) -> Option<&'a Scalar> {
        let idx = self.table.column_index(column)?;
        self.table.rows[self.index].get(idx)
    }

    /// Iterate `(column, cell)` pairs
    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a Scalar)> {
        let table = self.table;
        table
            .columns
            .iter()
            .map(String::as_str)
            .zip(table.rows[self.index].iter())
    }
}
