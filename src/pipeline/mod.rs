// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Pipeline definitions and execution
//!
//! This module defines the pipeline schema, the dependency graph built from
//! it, validation, and the branching executor.

mod dag;
mod definition;
mod executor;
mod state;
mod validation;

pub use dag::DagBuilder;
pub use definition::*;
pub use executor::{ExecutionOptions, PipelineExecutor, PlannedStep, SchedulingStrategy, StepOutput};
pub use state::{Artifact, RunReport, RunStatus, SkipReason, StepReport, StepState};
pub use validation::{PipelineValidator, ValidationResult};
