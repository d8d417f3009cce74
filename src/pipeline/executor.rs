// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Pipeline executor
//!
//! Runs pipeline steps in dependency order, wave by wave. The branch decision
//! is applied as soon as the decision step completes, before the next wave is
//! scheduled, so steps of an unselected branch are never started.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::branch::{BranchSelector, Selection, VariableStore};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::state::{
    Artifact, RunReport, RunStatus, SkipReason, StepReport, StepState,
};
use crate::pipeline::{DagBuilder, Pipeline, PipelineValidator, Step};
use crate::sink::ArtifactSink;
use crate::store::ResultStore;
use crate::transforms::Transform;

/// Strategy for scheduling ready steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One step at a time, in topological order
    Sequential,
    /// All ready steps of a wave concurrently
    #[default]
    Parallel,
}

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub strategy: SchedulingStrategy,
}

/// What a successful step produced
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Dataset written to the store under the step id
    Stored { rows: usize },
    /// Dataset written to the sink
    Artifact(Artifact),
    /// Branch decision
    Decision(Selection),
}

/// One planned step, for dry runs
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub id: String,
    pub transform: &'static str,
    pub group: Option<String>,
    pub depends_on: Vec<String>,
    /// Branches this step belongs to
    pub branches: Vec<String>,
}

/// Everything a step needs while it runs
#[derive(Clone)]
struct StepContext {
    store: Arc<ResultStore>,
    sink: Arc<dyn ArtifactSink>,
    variables: Arc<dyn VariableStore>,
    selector: Arc<BranchSelector>,
    working_dir: PathBuf,
}

impl StepContext {
    async fn run(&self, step: &Step) -> PipelineResult<StepOutput> {
        if let Transform::Branch = step.transform {
            return self
                .selector
                .select_from(self.variables.as_ref())
                .map(StepOutput::Decision);
        }

        let input = match step.input_slot() {
            Some(slot) => Some(self.store.get(slot).await?),
            None => None,
        };
        let dataset = step
            .transform
            .apply(input.as_deref(), &self.working_dir)?;
        let rows = dataset.len();

        match &step.output {
            Some(name) => {
                let location = self.sink.write(name, &dataset).await?;
                Ok(StepOutput::Artifact(Artifact {
                    step: step.id.clone(),
                    name: name.clone(),
                    location,
                    rows,
                }))
            }
            None => {
                self.store.put(&step.id, dataset, &step.id).await;
                Ok(StepOutput::Stored { rows })
            }
        }
    }
}

/// Mutable bookkeeping for one run
struct RunState<'p> {
    pipeline: &'p Pipeline,
    dag: DagBuilder,
    order: Vec<String>,
    states: HashMap<String, StepState>,
    durations: HashMap<String, Duration>,
    /// Steps inside any branch; failures elsewhere abort the run
    branch_steps: BTreeSet<String>,
    selection: Option<Selection>,
    aborted_by: Option<String>,
    artifacts: Vec<Artifact>,
}

impl<'p> RunState<'p> {
    fn new(pipeline: &'p Pipeline) -> PipelineResult<Self> {
        let dag = DagBuilder::build(pipeline)?;
        let order = dag.topological_order_names()?;
        let branch_steps = dag
            .branch_members(pipeline)
            .into_values()
            .flatten()
            .collect();
        let states = order
            .iter()
            .map(|id| (id.clone(), StepState::Pending))
            .collect();

        Ok(Self {
            pipeline,
            dag,
            order,
            states,
            durations: HashMap::new(),
            branch_steps,
            selection: None,
            aborted_by: None,
            artifacts: Vec::new(),
        })
    }

    fn state(&self, id: &str) -> &StepState {
        &self.states[id]
    }

    fn set(&mut self, id: &str, state: StepState) {
        debug!(step = id, state = state.label(), "step state changed");
        self.states.insert(id.to_string(), state);
    }

    /// Resolve pending steps that can never run because of a predecessor
    fn propagate_blocked(&mut self) {
        for id in self.order.clone() {
            if *self.state(&id) != StepState::Pending {
                continue;
            }
            let deps = self.dag.dependencies(&id).unwrap_or_default();

            if let Some(failed) = deps.iter().find(|d| self.state(d).is_failed()) {
                let error = PipelineError::UpstreamFailed {
                    step: failed.clone(),
                };
                warn!(step = %id, upstream = %failed, "not running step, upstream failed");
                self.set(&id, StepState::Failed { error });
            } else if let Some(skipped) = deps.iter().find(|d| self.state(d).is_skipped()) {
                let reason = SkipReason::UpstreamSkipped {
                    step: skipped.clone(),
                };
                self.set(&id, StepState::Skipped { reason });
            }
        }
    }

    /// Pending steps whose predecessors all completed, in topological order
    fn ready_steps(&mut self) -> Vec<String> {
        let ready: Vec<String> = self
            .order
            .iter()
            .filter(|id| *self.state(id) == StepState::Pending)
            .filter(|id| {
                self.dag
                    .dependencies(id)
                    .unwrap_or_default()
                    .iter()
                    .all(|d| self.state(d).is_completed())
            })
            .cloned()
            .collect();

        for id in &ready {
            self.set(id, StepState::Ready);
        }
        ready
    }

    /// Record the result of one step
    fn finish(&mut self, id: &str, result: PipelineResult<StepOutput>, elapsed: Duration) {
        self.durations.insert(id.to_string(), elapsed);

        match result {
            Ok(StepOutput::Decision(selection)) => {
                self.set(id, StepState::Completed);
                self.prune(&selection.branch);
                self.selection = Some(selection);
            }
            Ok(StepOutput::Artifact(artifact)) => {
                info!(step = id, artifact = %artifact.name, rows = artifact.rows, "step completed");
                self.artifacts.push(artifact);
                self.set(id, StepState::Completed);
            }
            Ok(StepOutput::Stored { rows }) => {
                info!(step = id, rows, "step completed");
                self.set(id, StepState::Completed);
            }
            Err(e) => {
                error!(step = id, kind = e.kind(), error = %e, "step failed");
                self.set(id, StepState::Failed { error: e });
                if !self.branch_steps.contains(id) && self.aborted_by.is_none() {
                    self.abort(id);
                }
            }
        }
    }

    /// Skip everything only reachable through an unselected branch
    fn prune(&mut self, selected: &str) {
        for (step, branch) in self.dag.pruned_steps(self.pipeline, selected) {
            if *self.state(&step) == StepState::Pending {
                debug!(step = %step, branch = %branch, "pruning step of unselected branch");
                self.set(&step, StepState::Skipped {
                    reason: SkipReason::BranchNotSelected { branch },
                });
            }
        }
    }

    /// Stop the run after a shared step failed; steps already in flight
    /// keep their own outcome
    fn abort(&mut self, cause: &str) {
        warn!(step = cause, "shared step failed, aborting run");
        self.aborted_by = Some(cause.to_string());
        for id in self.order.clone() {
            let state = self.state(&id);
            if !state.is_terminal() && *state != StepState::Running {
                self.set(&id, StepState::Skipped {
                    reason: SkipReason::RunAborted {
                        cause: cause.to_string(),
                    },
                });
            }
        }
    }

    fn into_report(self, duration: Duration) -> RunReport {
        let status = if self.states.values().any(StepState::is_failed) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let mut states = self.states;
        let steps = self
            .order
            .iter()
            .map(|id| StepReport {
                id: id.clone(),
                group: self.pipeline.get_step(id).and_then(|s| s.group.clone()),
                state: states.remove(id).unwrap_or(StepState::Pending),
                duration: self.durations.get(id).copied(),
            })
            .collect();

        RunReport {
            pipeline: self.pipeline.name.clone(),
            status,
            selection: self.selection,
            steps,
            aborted_by: self.aborted_by,
            artifacts: self.artifacts,
            duration,
        }
    }
}

/// Pipeline executor
pub struct PipelineExecutor {
    /// Destination of terminal artifacts
    sink: Arc<dyn ArtifactSink>,
    /// Source of the branching variable
    variables: Arc<dyn VariableStore>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(sink: Arc<dyn ArtifactSink>, variables: Arc<dyn VariableStore>) -> Self {
        Self { sink, variables }
    }

    fn context(
        &self,
        pipeline: &Pipeline,
        store: Arc<ResultStore>,
        working_dir: &Path,
    ) -> PipelineResult<StepContext> {
        Ok(StepContext {
            store,
            sink: Arc::clone(&self.sink),
            variables: Arc::clone(&self.variables),
            selector: Arc::new(pipeline.selector()?),
            working_dir: working_dir.to_path_buf(),
        })
    }

    /// Execute a pipeline with a fresh result store
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        working_dir: &Path,
        options: &ExecutionOptions,
    ) -> PipelineResult<RunReport> {
        let start = Instant::now();
        Self::ensure_runnable(pipeline)?;
        let mut run = RunState::new(pipeline)?;
        let store = Arc::new(ResultStore::new());
        let ctx = self.context(pipeline, Arc::clone(&store), working_dir)?;

        info!(
            pipeline = %pipeline.name,
            steps = run.order.len(),
            strategy = ?options.strategy,
            "starting pipeline run"
        );

        loop {
            run.propagate_blocked();
            let wave = run.ready_steps();
            if wave.is_empty() {
                break;
            }

            match options.strategy {
                SchedulingStrategy::Sequential => {
                    for id in wave {
                        // An earlier step in this wave may have aborted the run
                        if *run.state(&id) != StepState::Ready {
                            continue;
                        }
                        let step = Self::step(pipeline, &id)?;
                        run.set(&id, StepState::Running);
                        let started = Instant::now();
                        let result = ctx.run(step).await;
                        run.finish(&id, result, started.elapsed());
                    }
                }
                SchedulingStrategy::Parallel => {
                    let mut tasks = JoinSet::new();
                    for id in wave {
                        let step = Self::step(pipeline, &id)?.clone();
                        let ctx = ctx.clone();
                        run.set(&id, StepState::Running);
                        tasks.spawn(async move {
                            let started = Instant::now();
                            let result = ctx.run(&step).await;
                            (step.id, result, started.elapsed())
                        });
                    }

                    let mut finished = BTreeMap::new();
                    while let Some(joined) = tasks.join_next().await {
                        let (id, result, elapsed) = joined.map_err(|e| PipelineError::Io {
                            message: format!("step task failed to complete: {}", e),
                        })?;
                        finished.insert(id, (result, elapsed));
                    }
                    // Apply in a stable order so shared-step aborts are deterministic
                    for (id, (result, elapsed)) in finished {
                        run.finish(&id, result, elapsed);
                    }
                }
            }
        }

        let report = run.into_report(start.elapsed());
        info!(
            pipeline = %report.pipeline,
            status = %report.status,
            branch = report.selection.as_ref().map(|s| s.branch.as_str()),
            duration_ms = report.duration.as_millis() as u64,
            "pipeline run finished"
        );
        Ok(report)
    }

    /// Refuse pipelines where a branch could start before the decision
    fn ensure_runnable(pipeline: &Pipeline) -> PipelineResult<()> {
        let decision = &pipeline.branching.decision_step;
        for branch in &pipeline.branching.branches {
            let gated = pipeline
                .get_step(&branch.entry)
                .is_some_and(|entry| entry.depends_on.contains(decision));
            if !gated {
                return Err(PipelineError::InvalidBranching {
                    reason: format!(
                        "entry step '{}' of branch '{}' must depend on decision step '{}'",
                        branch.entry, branch.id, decision
                    ),
                });
            }
        }

        PipelineValidator::validate(pipeline)?.into_result().map(|_| ())
    }

    fn step<'p>(pipeline: &'p Pipeline, id: &str) -> PipelineResult<&'p Step> {
        pipeline.get_step(id).ok_or_else(|| PipelineError::StepNotFound {
            step: id.to_string(),
        })
    }

    /// Run one step against a caller-owned store.
    ///
    /// Entry point for hosts that schedule steps themselves; the host is then
    /// responsible for dependency order and for honoring branch decisions.
    pub async fn run_step(
        &self,
        pipeline: &Pipeline,
        step_id: &str,
        store: Arc<ResultStore>,
        working_dir: &Path,
    ) -> PipelineResult<StepOutput> {
        let step = Self::step(pipeline, step_id)?;
        self.context(pipeline, store, working_dir)?.run(step).await
    }

    /// Evaluate the branch decision and return the selected branch id
    pub fn decide_branch(&self, pipeline: &Pipeline) -> PipelineResult<String> {
        pipeline
            .selector()?
            .select_from(self.variables.as_ref())
            .map(|selection| selection.branch)
    }

    /// Steps a host must skip once `branch` is selected
    pub fn skipped_for(pipeline: &Pipeline, branch: &str) -> PipelineResult<Vec<String>> {
        Self::ensure_runnable(pipeline)?;
        let dag = DagBuilder::build(pipeline)?;
        Ok(dag.pruned_steps(pipeline, branch).into_keys().collect())
    }

    /// Execution plan without running anything
    pub fn plan(pipeline: &Pipeline) -> PipelineResult<Vec<PlannedStep>> {
        let dag = DagBuilder::build(pipeline)?;
        let members = dag.branch_members(pipeline);

        dag.topological_order_names()?
            .into_iter()
            .map(|id| -> PipelineResult<PlannedStep> {
                let step = Self::step(pipeline, &id)?;
                Ok(PlannedStep {
                    transform: step.transform.name(),
                    group: step.group.clone(),
                    depends_on: dag.dependencies(&id).unwrap_or_default(),
                    branches: members
                        .iter()
                        .filter(|(_, steps)| steps.contains(&id))
                        .map(|(branch, _)| branch.clone())
                        .collect(),
                    id,
                })
            })
            .collect()
    }
}
