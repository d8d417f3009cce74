// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .branchflow.yaml files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::branch::{BranchRule, BranchSelector};
use crate::errors::{PipelineError, PipelineResult};
use crate::transforms::Transform;

/// Default pipeline file name
pub const DEFAULT_PIPELINE_FILE: &str = ".branchflow.yaml";

/// Pipeline definition from .branchflow.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Directory artifacts are written to, relative to the pipeline file
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Steps, in any order; execution order comes from dependencies
    pub steps: Vec<Step>,

    /// Branch decision and the branches it chooses between
    pub branching: Branching,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Pipeline {
    /// Load pipeline from a YAML or TOML file
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> PipelineResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse pipeline from TOML string
    pub fn from_toml(content: &str) -> PipelineResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> PipelineResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a step by id
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps by group, ungrouped steps under the empty string
    pub fn groups(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for step in &self.steps {
            groups
                .entry(step.group.as_deref().unwrap_or(""))
                .or_default()
                .push(step.id.as_str());
        }
        groups
    }

    /// Build the branch selector declared by this pipeline
    pub fn selector(&self) -> PipelineResult<BranchSelector> {
        let branches: Vec<&str> = self.branching.branches.iter().map(|b| b.id.as_str()).collect();
        BranchSelector::new(&self.branching.variable, &self.branching.rules, &branches)
    }
}

/// A single pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step id (must be unique within pipeline); also its store key
    pub id: String,

    /// Group the step is listed under; has no effect on ordering
    #[serde(default)]
    pub group: Option<String>,

    /// Step description
    #[serde(default)]
    pub description: Option<String>,

    /// Transform to run
    pub transform: Transform,

    /// Step dependencies (other step ids)
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Step whose stored dataset this step reads (implies a dependency)
    #[serde(default)]
    pub input: Option<String>,

    /// Artifact name; when set the result goes to the sink instead of the store
    #[serde(default)]
    pub output: Option<String>,
}

impl Step {
    /// Create a step with no dependencies
    pub fn new(id: impl Into<String>, transform: Transform) -> Self {
        Self {
            id: id.into(),
            group: None,
            description: None,
            transform,
            depends_on: Vec::new(),
            input: None,
            output: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn after(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    pub fn reading(mut self, step: impl Into<String>) -> Self {
        self.input = Some(step.into());
        self
    }

    pub fn writing(mut self, artifact: impl Into<String>) -> Self {
        self.output = Some(artifact.into());
        self
    }

    /// Store key this step reads: `input`, or its only dependency
    pub fn input_slot(&self) -> Option<&str> {
        if !self.transform.needs_input() {
            return None;
        }
        match (&self.input, self.depends_on.as_slice()) {
            (Some(input), _) => Some(input),
            (None, [only]) => Some(only),
            _ => None,
        }
    }

    /// Whether the step writes an artifact instead of a store entry
    pub fn is_terminal(&self) -> bool {
        self.output.is_some()
    }
}

/// Branch decision configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branching {
    /// Step that evaluates the selector
    pub decision_step: String,

    /// Variable holding the decision value
    #[serde(default = "default_variable")]
    pub variable: String,

    /// Rule table, first match wins
    pub rules: Vec<BranchRule>,

    /// Mutually exclusive branches
    pub branches: Vec<Branch>,
}

fn default_variable() -> String {
    "transform_action".to_string()
}

impl Branching {
    /// Branch whose entry is `step`
    pub fn branch_entered_by(&self, step: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.entry == step)
    }
}

/// A branch, headed by its entry step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch id, the selector's output
    pub id: String,

    /// First step of the branch; must depend on the decision step
    pub entry: String,

    #[serde(default)]
    pub description: Option<String>,
}
