//! Sequential, resumable stage runner
//!
//! The engine owns the facts of a run. It loads the checkpoint, runs every
//! pending stage in order and persists progress after each one, so an
//! interrupted run resumes at the first stage that has not completed.

use super::error::StageError;
use super::facts::WorkflowFacts;
use super::stage::{Stage, StageContext};
use crate::checkpoint::{CheckpointRecord, CheckpointStore, WorkflowMode};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running { stage_index: usize },
    Completed,
    Failed { stage_index: usize },
}

#[derive(Debug)]
pub enum WorkflowOutcome {
    Completed {
        facts: WorkflowFacts,
    },
    Failed {
        stage_index: usize,
        stage: &'static str,
        error: StageError,
    },
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }
}

/// Result of one engine invocation
#[derive(Debug)]
pub struct WorkflowRun {
    pub outcome: WorkflowOutcome,
    /// Names of the stages executed by this invocation, in order
    pub stages_run: Vec<&'static str>,
    /// Supplied values that were dropped because the fact was already recorded
    pub ignored_overrides: Vec<String>,
}

pub struct WorkflowEngine {
    store: Arc<dyn CheckpointStore>,
    ctx: StageContext,
    state: EngineState,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn CheckpointStore>, ctx: StageContext) -> Self {
        Self {
            store,
            ctx,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run `stages` for `mode`, resuming from the persisted checkpoint.
    ///
    /// `supplied` only fills facts that are not yet recorded. Stage failures
    /// are reported through [`WorkflowOutcome::Failed`]; `Err` is reserved for
    /// problems that prevent the run from starting or its progress from
    /// being persisted.
    pub async fn run(
        &mut self,
        mode: WorkflowMode,
        stages: &[Box<dyn Stage>],
        supplied: WorkflowFacts,
    ) -> Result<WorkflowRun, StageError> {
        let mut record = self.load_or_start(mode, stages.len()).await?;

        let ignored_overrides = record.facts.fill_missing(&supplied);
        if !ignored_overrides.is_empty() {
            warn!(keys = ?ignored_overrides, "Ignoring supplied values for facts already recorded");
        }

        self.store.save(&record).await?;

        let total = stages.len();
        let mut stages_run = Vec::new();

        while record.stage_index < total {
            let index = record.stage_index;
            let stage = &stages[index];
            self.state = EngineState::Running { stage_index: index };

            println!("🔄 [{}/{}] {}", index + 1, total, stage.name());
            stages_run.push(stage.name());

            let result = match record.facts.missing(stage.required_facts()).as_slice() {
                [] => {
                    let span = info_span!("stage", stage = stage.name(), index);
                    stage.run(&self.ctx, &record.facts).instrument(span).await
                }
                missing => Err(StageError::precondition(format!(
                    "stage '{}' requires facts that were never recorded: {}",
                    stage.name(),
                    missing.join(", ")
                ))),
            };

            match result {
                Ok(delta) => {
                    record.facts.merge_delta(delta);
                    record.stage_index = index + 1;
                    self.store.save(&record).await?;
                    info!(stage = stage.name(), index, "Stage completed");
                }
                Err(err) => {
                    error!(stage = stage.name(), index, kind = err.kind(), error = %err, "Stage failed");
                    self.store.save(&record).await?;
                    self.state = EngineState::Failed { stage_index: index };
                    return Ok(WorkflowRun {
                        outcome: WorkflowOutcome::Failed {
                            stage_index: index,
                            stage: stage.name(),
                            error: err,
                        },
                        stages_run,
                        ignored_overrides,
                    });
                }
            }
        }

        self.state = EngineState::Completed;
        info!(mode = %mode, stages = stages_run.len(), "Workflow completed");

        Ok(WorkflowRun {
            outcome: WorkflowOutcome::Completed { facts: record.facts },
            stages_run,
            ignored_overrides,
        })
    }

    async fn load_or_start(&self, mode: WorkflowMode, total: usize) -> Result<CheckpointRecord, StageError> {
        let Some(mut record) = self.store.load(mode).await? else {
            info!(mode = %mode, "No checkpoint; starting at the first stage");
            return Ok(CheckpointRecord::new(mode, WorkflowFacts::new()));
        };

        if record.mode != mode {
            return Err(StageError::precondition(format!(
                "checkpoint belongs to '{}' but '{mode}' was requested",
                record.mode
            )));
        }
        if record.stage_index > total {
            return Err(StageError::precondition(format!(
                "checkpoint stage index {} is beyond the {total} stages of '{mode}'",
                record.stage_index
            )));
        }

        // A finished update is the start of the next round of changes
        if mode == WorkflowMode::Update && record.is_complete(total) {
            info!("Previous update completed; starting a new update cycle");
            record.stage_index = 0;
        }

        info!(mode = %mode, stage_index = record.stage_index, "Resuming from checkpoint");
        Ok(record)
    }
}
