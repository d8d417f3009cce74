// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! In-memory tabular data
//!
//! A [`Dataset`] is an ordered list of typed columns plus ordered rows. It is
//! validated on construction and never mutated afterwards: transforms build
//! new datasets from the rows they keep or compute.

mod io;

pub use io::{read_csv, read_csv_str, write_csv, write_csv_string};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::{PipelineError, PipelineResult};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Type of this value, `None` for null
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Number(_) => Some(ColumnType::Number),
            Self::String(_) => Some(ColumnType::String),
        }
    }

    /// Equality used by filters and grouping: null matches nothing
    pub fn matches(&self, other: &Value) -> bool {
        !self.is_null() && self == other
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Immutable table of typed columns and ordered rows
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset, checking column names, row widths and cell types
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> PipelineResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::InvalidDataset {
                    reason: format!("duplicate column name '{}'", column.name),
                });
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PipelineError::InvalidDataset {
                    reason: format!(
                        "row {} has {} values but the dataset has {} columns",
                        i,
                        row.len(),
                        columns.len()
                    ),
                });
            }

            for (value, column) in row.iter().zip(&columns) {
                if let Some(t) = value.column_type() {
                    if t != column.column_type {
                        return Err(PipelineError::InvalidDataset {
                            reason: format!(
                                "row {} has a {} value in {} column '{}'",
                                i, t, column.column_type, column.name
                            ),
                        });
                    }
                }
            }
        }

        Ok(Self { columns, rows })
    }

    /// Dataset with the given columns and no rows
    pub fn empty(columns: Vec<Column>) -> PipelineResult<Self> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of `name`, or a `MissingColumn` error naming the known columns
    pub fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::missing_column(name, &self.column_names()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// New dataset with the same columns, keeping rows accepted by `keep`
    pub fn retain_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        let rows = self
            .rows()
            .filter(|row| keep(row))
            .map(|row| row.values.to_vec())
            .collect();

        Self {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// Borrowed view of one dataset row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [Column],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .map(|i| &self.values[i])
    }

    pub fn value_at(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn has_null(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec![
                Column::new("loc", ColumnType::String),
                Column::new("amt", ColumnType::Number),
            ],
            vec![
                vec!["San Diego".into(), 10.0.into()],
                vec!["NYC".into(), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_row_access_by_name() {
        let ds = sample();
        let row = ds.row(0).unwrap();
        assert_eq!(row.get("loc"), Some(&Value::from("San Diego")));
        assert_eq!(row.get("amt"), Some(&Value::Number(10.0)));
        assert_eq!(row.get("missing"), None);
        assert!(ds.row(1).unwrap().has_null());
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = Dataset::new(
            vec![
                Column::new("a", ColumnType::Number),
                Column::new("a", ColumnType::String),
            ],
            vec![],
        );
        assert!(matches!(result, Err(PipelineError::InvalidDataset { .. })));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = Dataset::new(
            vec![Column::new("a", ColumnType::Number)],
            vec![vec![1.0.into(), 2.0.into()]],
        );
        assert!(matches!(result, Err(PipelineError::InvalidDataset { .. })));
    }

    #[test]
    fn test_rejects_mistyped_cells() {
        let result = Dataset::new(
            vec![Column::new("a", ColumnType::Number)],
            vec![vec!["text".into()]],
        );
        assert!(matches!(result, Err(PipelineError::InvalidDataset { .. })));
    }

    #[test]
    fn test_retain_rows_leaves_source_untouched() {
        let ds = sample();
        let kept = ds.retain_rows(|row| !row.has_null());
        assert_eq!(kept.len(), 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(kept.columns(), ds.columns());
    }

    #[test]
    fn test_null_matches_nothing() {
        assert!(!Value::Null.matches(&Value::Null));
        assert!(Value::from("x").matches(&Value::from("x")));
        assert!(!Value::from(1.0).matches(&Value::from("1")));
    }

    #[test]
    fn test_value_from_yaml_scalars() {
        let values: Vec<Value> = serde_yaml::from_str("[San Diego, 10, 2.5, null]").unwrap();
        assert_eq!(
            values,
            vec![
                Value::from("San Diego"),
                Value::Number(10.0),
                Value::Number(2.5),
                Value::Null
            ]
        );
    }
}
