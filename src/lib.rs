// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! # branchflow - Branching Data Pipelines
//!
//! `branchflow` runs small CSV pipelines shaped as a DAG with one branch point:
//! ingest and clean a dataset, read a variable, then run exactly one of
//! several mutually exclusive transform branches.
//!
//! ## Features
//!
//! - **Declarative pipelines** - Steps, groups and branches in YAML or TOML
//! - **Branch pruning** - Unselected branches are skipped, never started
//! - **Failure isolation** - A failing branch does not take down shared steps
//! - **Embeddable** - Run single steps against your own store and scheduler
//!
//! ## Quick Start
//!
//! ```bash
//! # Write the sample transaction pipeline
//! branchflow init
//!
//! # Run the filtering branch
//! branchflow run --var transform_action=filter_by_location
//!
//! # Show the graph
//! branchflow graph --format mermaid
//! ```

pub mod branch;
pub mod cli;
pub mod dataset;
pub mod errors;
pub mod pipeline;
pub mod sink;
pub mod store;
pub mod transforms;

// Re-export commonly used types
pub use dataset::{Dataset, Value};
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, PipelineExecutor, RunReport, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
