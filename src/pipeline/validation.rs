// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{DagBuilder, Pipeline, Step};
use crate::transforms::Transform;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> PipelineResult<ValidationResult> {
        let mut result = ValidationResult::new();

        // Check for empty pipeline
        if pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        // Check for duplicate step ids
        let mut seen_ids = HashSet::new();
        for step in &pipeline.steps {
            if !seen_ids.insert(&step.id) {
                result.add_error(&format!("Duplicate step id: '{}'", step.id));
            }
        }

        // Validate DAG structure (checks for cycles and unknown dependencies)
        let dag = match DagBuilder::build(pipeline) {
            Ok(dag) => Some(dag),
            Err(PipelineError::CircularDependency { steps }) => {
                result.add_error(&format!("Circular dependency: {}", steps.join(" -> ")));
                None
            }
            Err(PipelineError::UnknownDependency { step, dependency }) => {
                result.add_error(&format!(
                    "Step '{}' depends on unknown step '{}'",
                    step, dependency
                ));
                None
            }
            // Already reported above
            Err(PipelineError::DuplicateStep { .. }) => None,
            Err(e) => {
                result.add_error(&format!("DAG validation error: {}", e));
                None
            }
        };

        for step in &pipeline.steps {
            Self::validate_step(step, pipeline, &mut result);
        }

        Self::validate_outputs(pipeline, &mut result);
        Self::validate_branching(pipeline, dag.as_ref(), &mut result);

        Ok(result)
    }

    /// Validate a single step's data wiring
    fn validate_step(step: &Step, pipeline: &Pipeline, result: &mut ValidationResult) {
        if let Transform::GroupAndAggregate { group_by, aggregations } = &step.transform {
            if aggregations.is_empty() {
                result.add_warning(&format!(
                    "Step '{}': No aggregations, output holds only '{}'",
                    step.id, group_by
                ));
            }

            // Output columns are the group column plus one per aggregation
            let mut names = HashSet::from([group_by.as_str()]);
            for aggregation in aggregations {
                let name = aggregation.output_name();
                if !names.insert(name) {
                    result.add_error(&format!(
                        "Step '{}': Output column '{}' of {}({}) is already taken; set an alias",
                        step.id, name, aggregation.function, aggregation.column
                    ));
                }
            }
        }

        if let Transform::FilterByColumnEquals { value, .. } = &step.transform {
            if value.is_null() {
                result.add_warning(&format!(
                    "Step '{}': Filtering on a null value never matches",
                    step.id
                ));
            }
        }

        if !step.transform.needs_input() {
            if step.input.is_some() {
                result.add_warning(&format!(
                    "Step '{}': '{}' transform ignores its input",
                    step.id,
                    step.transform.name()
                ));
            }
            return;
        }

        let Some(slot) = step.input_slot() else {
            result.add_error(&format!(
                "Step '{}': Cannot tell which dataset to read; set 'input' to one of [{}]",
                step.id,
                step.depends_on.join(", ")
            ));
            return;
        };

        // Unknown steps are reported by the DAG check
        let Some(source) = pipeline.get_step(slot) else {
            return;
        };

        if source.transform.is_branch() {
            result.add_error(&format!(
                "Step '{}': Input '{}' is a branch decision and produces no dataset",
                step.id, slot
            ));
        } else if source.is_terminal() {
            result.add_error(&format!(
                "Step '{}': Input '{}' writes artifact '{}' instead of a stored dataset",
                step.id,
                slot,
                source.output.as_deref().unwrap_or_default()
            ));
        }

        if let Some(input) = &step.input {
            if !step.depends_on.contains(input) {
                result.add_warning(&format!(
                    "Step '{}': Reads step '{}' but doesn't declare dependency. \
                     This will be added implicitly.",
                    step.id, input
                ));
            }
        }
    }

    /// Artifact names must be unique
    fn validate_outputs(pipeline: &Pipeline, result: &mut ValidationResult) {
        let mut writers: HashMap<&str, &str> = HashMap::new();
        for step in &pipeline.steps {
            let Some(output) = &step.output else {
                continue;
            };
            if output.is_empty() {
                result.add_error(&format!("Step '{}': Output name is empty", step.id));
            } else if let Some(previous) = writers.insert(output, &step.id) {
                result.add_error(&format!(
                    "Steps '{}' and '{}' both write artifact '{}'",
                    previous, step.id, output
                ));
            }
        }
    }

    fn validate_branching(
        pipeline: &Pipeline,
        dag: Option<&DagBuilder>,
        result: &mut ValidationResult,
    ) {
        let branching = &pipeline.branching;

        match pipeline.get_step(&branching.decision_step) {
            None => result.add_error(&format!(
                "Decision step '{}' is not defined",
                branching.decision_step
            )),
            Some(step) if !step.transform.is_branch() => result.add_error(&format!(
                "Decision step '{}' must use the 'branch' transform, found '{}'",
                step.id,
                step.transform.name()
            )),
            Some(_) => {}
        }

        for step in &pipeline.steps {
            if step.transform.is_branch() && step.id != branching.decision_step {
                result.add_error(&format!(
                    "Step '{}': Only the decision step may use the 'branch' transform",
                    step.id
                ));
            }
        }

        if branching.branches.is_empty() {
            result.add_error("Branching declares no branches");
        }
        if branching.rules.is_empty() {
            result.add_error("Branching declares no rules");
        }

        let mut seen = HashSet::new();
        let mut entries = HashSet::new();
        for branch in &branching.branches {
            if !seen.insert(branch.id.as_str()) {
                result.add_error(&format!("Duplicate branch id: '{}'", branch.id));
            }
            if !entries.insert(branch.entry.as_str()) {
                result.add_error(&format!(
                    "Branch '{}': Entry step '{}' already heads another branch",
                    branch.id, branch.entry
                ));
            }

            match pipeline.get_step(&branch.entry) {
                None => result.add_error(&format!(
                    "Branch '{}': Entry step '{}' is not defined",
                    branch.id, branch.entry
                )),
                Some(entry) if !entry.depends_on.contains(&branching.decision_step) => {
                    result.add_error(&format!(
                        "Branch '{}': Entry step '{}' must depend on decision step '{}'",
                        branch.id, branch.entry, branching.decision_step
                    ))
                }
                Some(_) => {}
            }

            if !branching.rules.iter().any(|r| r.branch == branch.id) {
                result.add_warning(&format!(
                    "Branch '{}': No rule selects this branch, it will always be skipped",
                    branch.id
                ));
            }
        }

        if let Err(e) = pipeline.selector() {
            result.add_error(&e.to_string());
        }

        let Some(dag) = dag else {
            return;
        };

        for (branch, members) in dag.branch_members(pipeline) {
            if members.contains(&branching.decision_step) {
                result.add_error(&format!(
                    "Branch '{}': Decision step '{}' cannot sit inside a branch",
                    branch, branching.decision_step
                ));
            }
        }

        let entries: HashSet<&str> = branching.branches.iter().map(|b| b.entry.as_str()).collect();
        for dependent in dag.dependents(&branching.decision_step).unwrap_or_default() {
            if !entries.contains(dependent.as_str()) {
                result.add_warning(&format!(
                    "Step '{}': Depends on the decision step but heads no branch, \
                     it runs whichever branch is selected",
                    dependent
                ));
            }
        }
    }

    /// Check that ingest sources exist (runtime validation)
    pub fn validate_files(pipeline: &Pipeline, base_path: &Path) -> PipelineResult<Vec<String>> {
        let mut missing = Vec::new();

        for step in &pipeline.steps {
            if let Transform::Ingest { path } = &step.transform {
                if !base_path.join(path).exists() {
                    missing.push(format!(
                        "Step '{}': Source file not found: {}",
                        step.id,
                        path.display()
                    ));
                }
            }
        }

        Ok(missing)
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Collapse into an error if anything failed
    pub fn into_result(self) -> PipelineResult<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(PipelineError::InvalidPipeline {
                reason: self.errors.join("; "),
                help: Some("Run 'branchflow validate' for details".to_string()),
            })
        }
    }
}
