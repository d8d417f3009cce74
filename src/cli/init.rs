// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Init command - write the sample transaction pipeline

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::pipeline::DEFAULT_PIPELINE_FILE;

const SAMPLE_DATASET: &str = "datasets/bank_transactions.csv";

const SAMPLE_ROWS: &str = "\
TransactionID,AccountID,TransactionAmount,TransactionType,Location,CustomerAge
TX000001,AC00128,14.09,Debit,San Diego,70
TX000002,AC00455,376.24,Debit,Houston,68
TX000003,AC00019,126.29,Debit,Mesa,19
TX000004,AC00070,184.5,Debit,Raleigh,26
TX000005,AC00411,13.45,Credit,Atlanta,26
TX000006,AC00393,92.15,Debit,Oklahoma City,
TX000007,AC00199,7.08,Credit,Seattle,37
TX000008,AC00069,171.42,Credit,San Diego,67
TX000009,AC00135,106.23,Credit,Omaha,51
TX000010,AC00385,815.96,Debit,San Diego,55
";

/// Run the init command
pub async fn run(force: bool, verbose: bool) -> Result<()> {
    let project_name = std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "transactions".to_string());

    println!("{}", "Initializing branchflow pipeline...".bold());
    println!();

    if Path::new(DEFAULT_PIPELINE_FILE).exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            DEFAULT_PIPELINE_FILE
        ));
    }

    let pipeline_content = generate_pipeline(&project_name);

    std::fs::write(DEFAULT_PIPELINE_FILE, &pipeline_content).map_err(|e| {
        miette::miette!("Failed to write {}: {}", DEFAULT_PIPELINE_FILE, e)
    })?;
    println!("  {} Created {}", "✓".green(), DEFAULT_PIPELINE_FILE);

    // Never clobber a real dataset, even with --force
    if !Path::new(SAMPLE_DATASET).exists() {
        std::fs::create_dir_all("datasets")
            .map_err(|e| miette::miette!("Failed to create directory 'datasets': {}", e))?;
        std::fs::write(SAMPLE_DATASET, SAMPLE_ROWS)
            .map_err(|e| miette::miette!("Failed to write {}: {}", SAMPLE_DATASET, e))?;
        println!("  {} Created {}", "✓".green(), SAMPLE_DATASET);
    }

    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Run {} to filter by location",
        "branchflow run --var transform_action=filter_by_location".cyan()
    );
    println!(
        "  2. Run {} to aggregate by type",
        "branchflow run --var transform_action=groupby_transaction_type".cyan()
    );
    println!("  3. Find the results under {}", "output/".cyan());
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", pipeline_content.dimmed());
    }

    Ok(())
}

fn generate_pipeline(name: &str) -> String {
    format!(
        r#"# branchflow pipeline configuration

version: "1"
name: "{name}"
description: "Clean bank transactions, then filter or aggregate them"
output_dir: output

steps:
  - id: read_csv_file
    group: reading_and_preprocessing
    transform:
      type: ingest
      path: {SAMPLE_DATASET}

  - id: remove_null_values
    group: reading_and_preprocessing
    transform:
      type: drop_null_rows
    depends_on: [read_csv_file]

  - id: determine_branch
    description: "Pick a branch from transform_action"
    transform:
      type: branch
    depends_on: [remove_null_values]

  - id: filter_by_location
    group: filtering
    transform:
      type: filter_by_column_equals
      column: Location
      value: San Diego
    depends_on: [determine_branch, remove_null_values]
    input: remove_null_values
    output: filter_by_location

  - id: groupby_transaction_type
    group: grouping
    transform:
      type: group_and_aggregate
      group_by: TransactionType
      aggregations:
        - column: CustomerAge
          function: mean
        - column: TransactionAmount
          function: sum
    depends_on: [determine_branch, remove_null_values]
    input: remove_null_values
    output: grouped_by_account_type

branching:
  decision_step: determine_branch
  variable: transform_action
  rules:
    - prefix: filter
      branch: filtering
    - exact: groupby_transaction_type
      branch: grouping
  branches:
    - id: filtering
      entry: filter_by_location
    - id: grouping
      entry: groupby_transaction_type
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::read_csv_str;
    use crate::pipeline::{Pipeline, PipelineValidator};

    #[test]
    fn test_generated_pipeline_is_valid() {
        let pipeline = Pipeline::from_yaml(&generate_pipeline("demo")).unwrap();
        assert_eq!(pipeline.name, "demo");

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_sample_rows_parse() {
        let ds = read_csv_str(SAMPLE_ROWS).unwrap();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.columns().len(), 6);
    }
}
