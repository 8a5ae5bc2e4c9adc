//! Tabular frames
//!
//! A frame is a list of named columns and rows of JSON values, the shape
//! exchanged with inference endpoints.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row, one value per column
pub type Row = Vec<Value>;

/// Named columns plus rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Frame {
    /// Create frame, checking every row against the columns
    ///
    /// # Errors
    /// - `FrameError::RaggedRow` for the first row of the wrong width
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, FrameError> {
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(FrameError::RaggedRow {
                row,
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    /// Create frame with columns and no rows
    #[inline]
    #[must_use]
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at `row` in column `name`
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Required columns this frame lacks, in the order given
    #[must_use]
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .cloned()
            .collect()
    }

    /// Split into the first `mid` rows and the rest
    ///
    /// `mid` is clamped to the number of rows.
    #[must_use]
    pub fn split_at(mut self, mid: usize) -> (Frame, Frame) {
        let tail = self.rows.split_off(mid.min(self.rows.len()));
        let columns = self.columns.clone();
        (self, Frame { columns, rows: tail })
    }

    /// Frames of at most `size` rows each, in order
    #[must_use]
    pub fn chunks(&self, size: usize) -> Vec<Frame> {
        self.rows
            .chunks(size.max(1))
            .map(|rows| Frame {
                columns: self.columns.clone(),
                rows: rows.to_vec(),
            })
            .collect()
    }

    /// Append another frame's rows
    ///
    /// An empty frame adopts the other frame's columns.
    ///
    /// # Errors
    /// - `FrameError::ColumnMismatch` if both have rows and columns differ
    pub fn append(&mut self, other: Frame) -> Result<(), FrameError> {
        if self.rows.is_empty() && self.columns != other.columns {
            self.columns = other.columns;
            self.rows = other.rows;
            return Ok(());
        }
        if other.rows.is_empty() {
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(FrameError::ColumnMismatch {
                expected: self.columns.clone(),
                actual: other.columns,
            });
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Placeholder result for an input row that could not be scored
    ///
    /// Shaped like `columns`: values are null except where a column also
    /// appears in this frame, in which case the input value is carried over.
    #[must_use]
    pub fn placeholder_row(&self, row: usize, columns: &[String]) -> Row {
        columns
            .iter()
            .map(|name| self.value(row, name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
