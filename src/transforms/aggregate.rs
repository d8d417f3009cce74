// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Group-by aggregation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::dataset::{Column, ColumnType, Dataset, Value};
use crate::errors::{PipelineError, PipelineResult};

/// Aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunction {
    Mean,
    Sum,
    Min,
    Max,
    Count,
}

impl AggFunction {
    fn is_numeric(self) -> bool {
        !matches!(self, Self::Count)
    }

    /// Fold the non-null cells of one partition
    fn apply<'a>(self, cells: impl Iterator<Item = &'a Value>) -> Value {
        let cells: Vec<&Value> = cells.filter(|v| !v.is_null()).collect();
        let numbers: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();

        match self {
            Self::Count => Value::Number(cells.len() as f64),
            Self::Sum => Value::Number(numbers.iter().sum()),
            _ if numbers.is_empty() => Value::Null,
            Self::Mean => Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64),
            Self::Min => Value::Number(numbers.iter().copied().fold(f64::INFINITY, f64::min)),
            Self::Max => Value::Number(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        }
    }
}

impl fmt::Display for AggFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Sum => write!(f, "sum"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// One aggregated output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Source column
    pub column: String,

    pub function: AggFunction,

    /// Output column name, defaults to the source column name
    #[serde(default)]
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(column: impl Into<String>, function: AggFunction) -> Self {
        Self {
            column: column.into(),
            function,
            alias: None,
        }
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> GroupKey<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            // + 0.0 folds -0.0 into 0.0
            Value::Number(n) => Some(Self::Number((n + 0.0).to_bits())),
            Value::String(s) => Some(Self::Text(s)),
        }
    }
}

/// Partition rows by `group_by` and aggregate each partition.
///
/// Partitions appear in first-occurrence order of their key. Rows whose key
/// is null belong to no partition.
pub fn group_and_aggregate(
    dataset: &Dataset,
    group_by: &str,
    aggregations: &[Aggregation],
) -> PipelineResult<Dataset> {
    let group_index = dataset.require_column(group_by)?;

    let mut targets = Vec::with_capacity(aggregations.len());
    for agg in aggregations {
        let index = dataset.require_column(&agg.column)?;
        let column = &dataset.columns()[index];
        if agg.function.is_numeric() && column.column_type != ColumnType::Number {
            return Err(PipelineError::NonNumericColumn {
                column: agg.column.clone(),
                function: agg.function.to_string(),
            });
        }
        targets.push(index);
    }

    let mut positions: HashMap<GroupKey<'_>, usize> = HashMap::new();
    let mut partitions: Vec<(&Value, Vec<usize>)> = Vec::new();

    for (row_index, row) in dataset.rows().enumerate() {
        let Some(cell) = row.value_at(group_index) else {
            continue;
        };
        let Some(key) = GroupKey::of(cell) else {
            continue;
        };

        let slot = *positions.entry(key).or_insert_with(|| {
            partitions.push((cell, Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(row_index);
    }

    let mut columns = vec![dataset.columns()[group_index].clone()];
    columns.extend(
        aggregations
            .iter()
            .map(|agg| Column::new(agg.output_name(), ColumnType::Number)),
    );

    let rows = partitions
        .iter()
        .map(|(key, members)| {
            let mut out = vec![(*key).clone()];
            for (agg, &target) in aggregations.iter().zip(&targets) {
                let cells = members
                    .iter()
                    .filter_map(|&i| dataset.row(i).and_then(|row| row.value_at(target)));
                out.push(agg.function.apply(cells));
            }
            out
        })
        .collect();

    Dataset::new(columns, rows)
}
