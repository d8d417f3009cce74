// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! CSV reading and writing
//!
//! Source files are delimited text with a header row. Column types are
//! inferred: a column is numeric when every non-null cell parses as a finite
//! number. Artifacts are written with a header row and no index column.

use std::path::Path;

use super::{Column, ColumnType, Dataset, Value};
use crate::errors::{PipelineError, PipelineResult};

/// Cell spellings read as null
const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Read a CSV file into a dataset
pub fn read_csv(path: &Path) -> PipelineResult<Dataset> {
    let unavailable = |reason: String| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let reader = csv::Reader::from_path(path).map_err(|e| unavailable(e.to_string()))?;
    from_reader(reader).map_err(|e| match e {
        PipelineError::SourceUnavailable { .. } => e,
        other => unavailable(other.to_string()),
    })
}

/// Parse CSV text into a dataset
pub fn read_csv_str(data: &str) -> PipelineResult<Dataset> {
    from_reader(csv::Reader::from_reader(data.as_bytes()))
}

fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> PipelineResult<Dataset> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut raw: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = record
            .iter()
            .map(|cell| {
                let cell = cell.trim();
                if NULL_MARKERS.contains(&cell) {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        raw.push(cells);
    }

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|i| infer_type(raw.iter().filter_map(|row| row.get(i)?.as_deref())))
        .collect();

    let rows = raw
        .into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .zip(&types)
                .map(|(cell, column_type)| match (cell, column_type) {
                    (None, _) => Value::Null,
                    (Some(s), ColumnType::Number) => {
                        s.parse::<f64>().map(Value::Number).unwrap_or(Value::Null)
                    }
                    (Some(s), ColumnType::String) => Value::String(s),
                })
                .collect()
        })
        .collect();

    let columns = headers
        .into_iter()
        .zip(types)
        .map(|(name, column_type)| Column::new(name, column_type))
        .collect();

    Dataset::new(columns, rows)
}

fn infer_type<'a>(mut cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let numeric = cells.all(|cell| cell.parse::<f64>().map(f64::is_finite).unwrap_or(false));
    if numeric {
        ColumnType::Number
    } else {
        ColumnType::String
    }
}

/// Render a dataset as CSV text
pub fn write_csv_string(dataset: &Dataset) -> PipelineResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.column_names())?;

    for row in dataset.rows() {
        writer.write_record(row.values().iter().map(Value::to_string))?;
    }

    let bytes = writer.into_inner().map_err(|e| PipelineError::Csv {
        message: e.to_string(),
    })?;

    String::from_utf8(bytes).map_err(|e| PipelineError::Csv {
        message: e.to_string(),
    })
}

/// Write a dataset to a CSV file
pub fn write_csv(path: &Path, dataset: &Dataset) -> PipelineResult<()> {
    let content = write_csv_string(dataset)?;
    std::fs::write(path, content).map_err(|e| PipelineError::SinkWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_infers_column_types() {
        let ds = read_csv_str("Location,Amount,Age\nSan Diego,10.5,30\nNYC,,40\n").unwrap();

        assert_eq!(ds.column("Location").unwrap().column_type, ColumnType::String);
        assert_eq!(ds.column("Amount").unwrap().column_type, ColumnType::Number);
        assert_eq!(ds.column("Age").unwrap().column_type, ColumnType::Number);
        assert_eq!(ds.row(1).unwrap().get("Amount"), Some(&Value::Null));
    }

    #[test]
    fn test_mixed_column_is_string() {
        let ds = read_csv_str("id\n1\nabc\n").unwrap();
        assert_eq!(ds.column("id").unwrap().column_type, ColumnType::String);
        assert_eq!(ds.row(0).unwrap().get("id"), Some(&Value::from("1")));
    }

    #[test]
    fn test_write_has_header_and_no_index() {
        let ds = read_csv_str("loc,amt\nSan Diego,10\nNYC,\n").unwrap();
        let out = write_csv_string(&ds).unwrap();
        assert_eq!(out, "loc,amt\nSan Diego,10\nNYC,\n");
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let temp = TempDir::new().unwrap();
        let result = read_csv(&temp.path().join("nope.csv"));
        assert!(matches!(result, Err(PipelineError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.csv");
        let ds = read_csv_str("a,b\nx,1\ny,2\n").unwrap();

        write_csv(&path, &ds).unwrap();
        assert_eq!(read_csv(&path).unwrap(), ds);
    }
}
