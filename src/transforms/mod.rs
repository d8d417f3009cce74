// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Transform steps
//!
//! Each transform is a pure function over its input dataset and static
//! parameters. None of them mutate their input, so re-running a step with the
//! same input yields the same output.

mod aggregate;

pub use aggregate::{group_and_aggregate, AggFunction, Aggregation};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::{read_csv, Dataset, Value};
use crate::errors::{PipelineError, PipelineResult};

/// Transform performed by a step, with its static parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Load a CSV source
    Ingest {
        /// Source path, relative to the pipeline file
        path: PathBuf,
    },

    /// Remove every row holding a null cell
    DropNullRows,

    /// Keep rows whose `column` equals `value`
    FilterByColumnEquals { column: String, value: Value },

    /// Group rows by `group_by` and aggregate the other columns
    GroupAndAggregate {
        group_by: String,
        aggregations: Vec<Aggregation>,
    },

    /// Branch decision: reads the branching variable, touches no data
    Branch,
}

impl Transform {
    /// Short name used in plans and graphs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ingest { .. } => "ingest",
            Self::DropNullRows => "drop_null_rows",
            Self::FilterByColumnEquals { .. } => "filter_by_column_equals",
            Self::GroupAndAggregate { .. } => "group_and_aggregate",
            Self::Branch => "branch",
        }
    }

    /// Whether this transform reads an input dataset
    pub fn needs_input(&self) -> bool {
        !matches!(self, Self::Ingest { .. } | Self::Branch)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch)
    }

    /// Apply a data transform.
    ///
    /// `input` is the dataset resolved from the store, `base_dir` anchors
    /// relative source paths. Not valid for [`Transform::Branch`], which the
    /// executor handles itself.
    pub fn apply(&self, input: Option<&Dataset>, base_dir: &Path) -> PipelineResult<Dataset> {
        match (self, input) {
            (Self::Ingest { path }, _) => ingest(&base_dir.join(path)),
            (Self::DropNullRows, Some(ds)) => Ok(drop_null_rows(ds)),
            (Self::FilterByColumnEquals { column, value }, Some(ds)) => {
                filter_by_column_equals(ds, column, value)
            }
            (
                Self::GroupAndAggregate {
                    group_by,
                    aggregations,
                },
                Some(ds),
            ) => group_and_aggregate(ds, group_by, aggregations),
            (Self::Branch, _) => Err(PipelineError::InvalidPipeline {
                reason: "branch steps do not transform data".into(),
                help: None,
            }),
            (transform, None) => Err(PipelineError::InvalidPipeline {
                reason: format!("'{}' requires an input dataset", transform.name()),
                help: Some("Set the step's 'input' to the step producing its data".into()),
            }),
        }
    }
}

/// Load a CSV source, preserving row order
pub fn ingest(path: &Path) -> PipelineResult<Dataset> {
    read_csv(path)
}

/// Rows with no null cell, in their original order
pub fn drop_null_rows(dataset: &Dataset) -> Dataset {
    dataset.retain_rows(|row| !row.has_null())
}

/// Rows where `column` equals `value`; null cells never match
pub fn filter_by_column_equals(
    dataset: &Dataset,
    column: &str,
    value: &Value,
) -> PipelineResult<Dataset> {
    let index = dataset.require_column(column)?;

    Ok(dataset.retain_rows(|row| {
        row.value_at(index)
            .map(|cell| cell.matches(value))
            .unwrap_or(false)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{read_csv_str, Column, ColumnType};

    fn transactions() -> Dataset {
        Dataset::new(
            vec![
                Column::new("loc", ColumnType::String),
                Column::new("amt", ColumnType::Number),
            ],
            vec![
                vec!["San Diego".into(), 10.0.into()],
                vec!["NYC".into(), 5.0.into()],
                vec!["San Diego".into(), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_drop_null_rows() {
        let cleaned = drop_null_rows(&transactions());
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.row(1).unwrap().get("loc"), Some(&Value::from("NYC")));
    }

    #[test]
    fn test_drop_null_rows_is_idempotent() {
        let datasets = [
            transactions(),
            read_csv_str("a,b,c\n1,,x\n,,\n2,3,y\n4,5,\n").unwrap(),
            Dataset::empty(vec![Column::new("a", ColumnType::Number)]).unwrap(),
        ];

        for ds in &datasets {
            let once = drop_null_rows(ds);
            assert_eq!(drop_null_rows(&once), once);
        }
    }

    #[test]
    fn test_filter_keeps_matching_rows_in_order() {
        let ds = read_csv_str("loc,amt\nSD,1\nNYC,2\nSD,3\nLA,4\nSD,5\n").unwrap();
        let filtered = filter_by_column_equals(&ds, "loc", &"SD".into()).unwrap();

        let amounts: Vec<f64> = filtered
            .rows()
            .map(|row| row.get("amt").and_then(Value::as_f64).unwrap())
            .collect();
        assert_eq!(amounts, vec![1.0, 3.0, 5.0]);
        assert!(filtered
            .rows()
            .all(|row| row.get("loc") == Some(&Value::from("SD"))));
    }

    #[test]
    fn test_filter_null_never_matches() {
        let ds = transactions();
        let filtered = filter_by_column_equals(&ds, "amt", &Value::Null).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_missing_column() {
        let result = filter_by_column_equals(&transactions(), "Location", &"San Diego".into());
        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { ref column, .. }) if column == "Location"
        ));
    }

    #[test]
    fn test_transform_from_yaml() {
        let yaml = r#"
- type: ingest
  path: data.csv
- type: drop_null_rows
- type: filter_by_column_equals
  column: Location
  value: San Diego
- type: group_and_aggregate
  group_by: TransactionType
  aggregations:
    - column: CustomerAge
      function: mean
- type: branch
"#;
        let transforms: Vec<Transform> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(transforms.len(), 5);
        assert_eq!(
            transforms[2],
            Transform::FilterByColumnEquals {
                column: "Location".into(),
                value: "San Diego".into(),
            }
        );
        assert!(transforms[4].is_branch());
        assert!(!transforms[0].needs_input());
        assert!(transforms[1].needs_input());
    }

    #[test]
    fn test_apply_without_input_fails() {
        let result = Transform::DropNullRows.apply(None, Path::new("."));
        assert!(matches!(result, Err(PipelineError::InvalidPipeline { .. })));
    }
}
