// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Integration tests for the CLI interface
//!
//! Every test starts from `branchflow init` in a fresh directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn branchflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("branchflow").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("BRANCHFLOW_VAR_TRANSFORM_ACTION")
        .env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let temp = TempDir::new().unwrap();
    branchflow(temp.path()).arg("init").assert().success();
    temp
}

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    branchflow(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = initialized();
    assert!(temp.path().join(".branchflow.yaml").exists());
    assert!(temp.path().join("datasets/bank_transactions.csv").exists());

    branchflow(temp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    branchflow(temp.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_run_filter_branch() {
    let temp = initialized();

    branchflow(temp.path())
        .args(["run", "--var", "transform_action=filter_by_location"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected branch filtering"))
        .stdout(predicate::str::contains("branch 'grouping' not selected"));

    let output = std::fs::read_to_string(temp.path().join("output/filter_by_location.csv")).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines[0],
        "TransactionID,AccountID,TransactionAmount,TransactionType,Location,CustomerAge"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1..].iter().all(|l| l.contains(",San Diego,")));
    assert!(lines[1].starts_with("TX000001,"));
    assert!(!temp.path().join("output/grouped_by_account_type.csv").exists());
}

#[test]
fn test_run_grouping_branch_from_variables_file() {
    let temp = initialized();
    std::fs::write(
        temp.path().join("vars.yaml"),
        "transform_action: groupby_transaction_type\n",
    )
    .unwrap();

    branchflow(temp.path())
        .args(["run", "--variables", "vars.yaml"])
        .assert()
        .success();

    let output =
        std::fs::read_to_string(temp.path().join("output/grouped_by_account_type.csv")).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "TransactionType,CustomerAge,TransactionAmount");
    assert!(lines[1].starts_with("Debit,47.6,"));
    assert!(lines[2].starts_with("Credit,45.25,"));
    assert_eq!(lines.len(), 3);
    assert!(!temp.path().join("output/filter_by_location.csv").exists());
}

#[test]
fn test_cli_var_beats_environment() {
    let temp = initialized();

    branchflow(temp.path())
        .env("BRANCHFLOW_VAR_TRANSFORM_ACTION", "groupby_transaction_type")
        .args(["run", "--var", "transform_action=filter"])
        .assert()
        .success();

    assert!(temp.path().join("output/filter_by_location.csv").exists());
}

#[test]
fn test_environment_variable() {
    let temp = initialized();

    branchflow(temp.path())
        .env("BRANCHFLOW_VAR_TRANSFORM_ACTION", "groupby_transaction_type")
        .arg("run")
        .assert()
        .success();

    assert!(temp.path().join("output/grouped_by_account_type.csv").exists());
}

#[test]
fn test_unknown_action_fails() {
    let temp = initialized();

    branchflow(temp.path())
        .args(["run", "--var", "transform_action=unknown_action"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("NoMatchingBranch"))
        .stdout(predicate::str::contains("Run aborted"));

    assert!(!temp.path().join("output").exists());
}

#[test]
fn test_missing_variable_fails() {
    let temp = initialized();

    branchflow(temp.path())
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("VariableMissing"));
}

#[test]
fn test_missing_column_fails_branch() {
    let temp = initialized();
    std::fs::write(
        temp.path().join("datasets/bank_transactions.csv"),
        "TransactionID,City\nTX1,San Diego\n",
    )
    .unwrap();

    branchflow(temp.path())
        .args(["run", "--var", "transform_action=filter"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("MissingColumn"))
        .stdout(predicate::str::contains("Run completed with failed steps."));
}

#[test]
fn test_json_report() {
    let temp = initialized();

    let output = branchflow(temp.path())
        .args(["run", "--var", "transform_action=filter", "--format", "json", "--sequential"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["selection"]["branch"], "filtering");
    assert_eq!(report["selection"]["remainder"], serde_json::Value::Null);
    assert_eq!(report["artifacts"][0]["rows"], 3);
    assert_eq!(report["steps"].as_array().unwrap().len(), 5);
}

#[test]
fn test_output_dir_override() {
    let temp = initialized();

    branchflow(temp.path())
        .args(["run", "--var", "transform_action=filter", "--output-dir", "results"])
        .assert()
        .success();

    assert!(temp.path().join("results/filter_by_location.csv").exists());
    assert!(!temp.path().join("output").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = initialized();

    branchflow(temp.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution plan"))
        .stdout(predicate::str::contains("filter_by_location (filter_by_column_equals)"));

    assert!(!temp.path().join("output").exists());
}

#[test]
fn test_validate() {
    let temp = initialized();

    branchflow(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn test_validate_missing_file() {
    let temp = TempDir::new().unwrap();

    branchflow(temp.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("branchflow init"));
}

#[test]
fn test_graph_formats() {
    let temp = initialized();

    branchflow(temp.path())
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "determine_branch -->|filtering| filter_by_location",
        ));

    branchflow(temp.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("label=\"grouping\", style=dashed"));

    branchflow(temp.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. read_csv_file (ingest)"));
}

#[test]
fn test_directory_flag() {
    let temp = initialized();
    let outer = temp.path().parent().unwrap();

    branchflow(outer)
        .arg("-C")
        .arg(temp.path())
        .args(["run", "--var", "transform_action=filter"])
        .assert()
        .success();

    assert!(temp.path().join("output/filter_by_location.csv").exists());
}
