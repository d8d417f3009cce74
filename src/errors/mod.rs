// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Error types
//!
//! Every failure a step, the graph builder or the CLI can hit is a variant of
//! [`PipelineError`]. Variants carry owned strings only, so a step failure can
//! be cloned into the run report.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for branchflow operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main error type for branchflow
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum PipelineError {
    // ─────────────────────────────────────────────────────────────────────────
    // Step Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Source '{path}' is unavailable: {reason}")]
    #[diagnostic(
        code(branchflow::source_unavailable),
        help("Check that the ingest path exists and is a CSV file with a header row")
    )]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("No dataset stored under '{key}' for this run")]
    #[diagnostic(
        code(branchflow::key_not_found),
        help("The step reading '{key}' must depend on the step that produces it")
    )]
    KeyNotFound { key: String },

    #[error("Column '{column}' does not exist in the dataset")]
    #[diagnostic(code(branchflow::missing_column))]
    MissingColumn {
        column: String,
        #[help]
        help: Option<String>,
    },

    #[error("Column '{column}' is not numeric and cannot be aggregated with '{function}'")]
    #[diagnostic(code(branchflow::non_numeric_column))]
    NonNumericColumn { column: String, function: String },

    #[error("Value '{value}' of variable '{variable}' matches no declared branch")]
    #[diagnostic(code(branchflow::no_matching_branch))]
    NoMatchingBranch {
        variable: String,
        value: String,
        #[help]
        help: Option<String>,
    },

    #[error("Variable '{variable}' is not set")]
    #[diagnostic(
        code(branchflow::variable_missing),
        help("Pass --var {variable}=<value>, a --variables file, or set BRANCHFLOW_VAR_<NAME>")
    )]
    VariableMissing { variable: String },

    #[error("Upstream step '{step}' failed")]
    #[diagnostic(code(branchflow::upstream_failed))]
    UpstreamFailed { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(branchflow::pipeline_not_found),
        help("Create a pipeline with 'branchflow init' or write .branchflow.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(branchflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid branching configuration: {reason}")]
    #[diagnostic(code(branchflow::invalid_branching))]
    InvalidBranching { reason: String },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(branchflow::circular_dependency),
        help("Review your step dependencies to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(branchflow::unknown_dependency),
        help("Check that '{dependency}' is defined in your pipeline")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Step id '{step}' is declared more than once")]
    #[diagnostic(code(branchflow::duplicate_step))]
    DuplicateStep { step: String },

    #[error("Step '{step}' not found in pipeline")]
    #[diagnostic(code(branchflow::step_not_found))]
    StepNotFound { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Data & IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid dataset: {reason}")]
    #[diagnostic(code(branchflow::invalid_dataset))]
    InvalidDataset { reason: String },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(branchflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write artifact '{path}': {error}")]
    #[diagnostic(code(branchflow::sink_write_error))]
    SinkWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(branchflow::io_error))]
    Io { message: String },

    #[error("CSV error: {message}")]
    #[diagnostic(code(branchflow::csv_error))]
    Csv { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(branchflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(branchflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(branchflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        Self::Csv { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl PipelineError {
    /// Create a missing column error that lists the columns that do exist
    pub fn missing_column(column: &str, available: &[&str]) -> Self {
        let help = if available.is_empty() {
            Some("The dataset has no columns".to_string())
        } else {
            Some(format!("Available columns: {}", available.join(", ")))
        };

        Self::MissingColumn {
            column: column.to_string(),
            help,
        }
    }

    /// Create a no-matching-branch error that lists the declared rules
    pub fn no_matching_branch(variable: &str, value: &str, rules: &[String]) -> Self {
        Self::NoMatchingBranch {
            variable: variable.to_string(),
            value: value.to_string(),
            help: Some(format!("Declared rules: {}", rules.join(", "))),
        }
    }

    /// Short, stable name of the error kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SourceUnavailable",
            Self::KeyNotFound { .. } => "KeyNotFound",
            Self::MissingColumn { .. } => "MissingColumn",
            Self::NonNumericColumn { .. } => "NonNumericColumn",
            Self::NoMatchingBranch { .. } => "NoMatchingBranch",
            Self::VariableMissing { .. } => "VariableMissing",
            Self::UpstreamFailed { .. } => "UpstreamFailed",
            Self::PipelineNotFound { .. } => "PipelineNotFound",
            Self::InvalidPipeline { .. } => "InvalidPipeline",
            Self::InvalidBranching { .. } => "InvalidBranching",
            Self::CircularDependency { .. } => "CircularDependency",
            Self::UnknownDependency { .. } => "UnknownDependency",
            Self::DuplicateStep { .. } => "DuplicateStep",
            Self::StepNotFound { .. } => "StepNotFound",
            Self::InvalidDataset { .. } => "InvalidDataset",
            Self::FileReadError { .. } => "FileReadError",
            Self::SinkWriteError { .. } => "SinkWriteError",
            Self::Io { .. } => "Io",
            Self::Csv { .. } => "Csv",
            Self::Yaml { .. } => "Yaml",
            Self::Json { .. } => "Json",
            Self::Toml { .. } => "Toml",
        }
    }
}
