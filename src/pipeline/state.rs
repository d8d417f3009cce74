// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Execution state models
//!
//! Per-step states and the report a run produces.

use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::branch::Selection;
use crate::errors::PipelineError;

/// Why a step was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The step belongs to a branch the selector did not pick
    BranchNotSelected { branch: String },
    /// A predecessor was skipped, so this step can never become ready
    UpstreamSkipped { step: String },
    /// A shared step failed and the run stopped
    RunAborted { cause: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BranchNotSelected { branch } => write!(f, "branch '{}' not selected", branch),
            Self::UpstreamSkipped { step } => write!(f, "upstream step '{}' skipped", step),
            Self::RunAborted { cause } => write!(f, "run aborted after '{}' failed", cause),
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, PartialEq)]
pub enum StepState {
    /// Waiting for dependencies
    Pending,
    /// All dependencies completed
    Ready,
    /// Currently running
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed { error: PipelineError },
    /// Never attempted
    Skipped { reason: SkipReason },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Skipped { .. }
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The error of a failed step
    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Lowercase state label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed ({}: {})", error.kind(), error),
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step that was not skipped completed
    Completed,
    /// At least one step failed
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A terminal artifact written by a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub step: String,
    pub name: String,
    /// Where the sink put it
    pub location: String,
    pub rows: usize,
}

/// Final state of one step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub id: String,
    pub group: Option<String>,
    pub state: StepState,
    /// Time spent running, `None` if never attempted
    pub duration: Option<Duration>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: String,
    pub status: RunStatus,
    /// Branch chosen by the decision step, if it ran
    pub selection: Option<Selection>,
    /// Steps in execution order
    pub steps: Vec<StepReport>,
    /// Shared step whose failure stopped the run
    pub aborted_by: Option<String>,
    pub artifacts: Vec<Artifact>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn step(&self, id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Final state of `id`
    pub fn state(&self, id: &str) -> Option<&StepState> {
        self.step(id).map(|s| &s.state)
    }

    fn ids_where(&self, pred: impl Fn(&StepState) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| pred(&s.state))
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn completed_steps(&self) -> Vec<&str> {
        self.ids_where(StepState::is_completed)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.ids_where(StepState::is_failed)
    }

    pub fn skipped_steps(&self) -> Vec<&str> {
        self.ids_where(StepState::is_skipped)
    }

    /// Render as JSON for machine consumers
    pub fn to_json(&self) -> serde_json::Value {
        let steps: Vec<serde_json::Value> = self
            .steps
            .iter()
            .map(|s| {
                let mut entry = json!({
                    "id": s.id,
                    "group": s.group,
                    "state": s.state.label(),
                    "duration_ms": s.duration.map(|d| d.as_millis() as u64),
                });
                match &s.state {
                    StepState::Failed { error } => {
                        entry["error"] = json!({ "kind": error.kind(), "message": error.to_string() });
                    }
                    StepState::Skipped { reason } => {
                        entry["reason"] = json!(reason.to_string());
                    }
                    _ => {}
                }
                entry
            })
            .collect();

        let artifacts: Vec<serde_json::Value> = self
            .artifacts
            .iter()
            .map(|a| json!({ "step": a.step, "name": a.name, "location": a.location, "rows": a.rows }))
            .collect();

        json!({
            "pipeline": self.pipeline,
            "status": self.status.to_string(),
            "selection": self.selection,
            "aborted_by": self.aborted_by,
            "steps": steps,
            "artifacts": artifacts,
            "duration_ms": self.duration.as_millis() as u64,
        })
    }
}
