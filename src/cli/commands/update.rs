use super::{checkpoint_store, resolve_repo_name};
use crate::checkpoint::{CheckpointStore, WorkflowMode};
use crate::cli::UpdateArgs;
use crate::prompt::FactProvider;
use crate::telemetry::{create_run_span, generate_correlation_id};
use crate::workflows::facts::keys;
use crate::workflows::{submit_stages, update_stages, StageContext, StageError, WorkflowEngine, WorkflowFacts, WorkflowRun};
use anyhow::Result;
use tracing::{info, warn, Instrument};

pub struct UpdateCommand {
    args: UpdateArgs,
}

impl UpdateCommand {
    pub fn new(args: UpdateArgs) -> Self {
        Self { args }
    }

    /// Values passed on the command line, keyed by fact name
    fn flag_facts(&self) -> WorkflowFacts {
        let mut facts = WorkflowFacts::new();
        let flags = [
            (keys::REPO_NAME, &self.args.extension_repo_name),
            (keys::DEPOT_FOLDER, &self.args.depot_folder),
        ];
        for (key, value) in flags {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                facts.insert(key, value);
            }
        }
        facts
    }

    pub async fn execute(&self, ctx: &StageContext, provider: &mut dyn FactProvider) -> Result<WorkflowRun> {
        let flags = self.flag_facts();
        let repo_name = resolve_repo_name(&flags, provider)?;

        let store = checkpoint_store(ctx, &repo_name);
        if self.args.reset {
            store.clear(WorkflowMode::Update).await?;
            println!("🧹 Cleared saved update progress for {repo_name}");
        }

        // A fresh update cycle is seeded from the finished submission; flags
        // then only fill what the submission did not record
        let mut supplied = flags.clone();
        let mut ignored = Vec::new();
        let in_progress = store.load(WorkflowMode::Update).await.map_err(StageError::from)?;
        if in_progress.is_none() {
            let submitted = store.load(WorkflowMode::Submit).await.map_err(StageError::from)?;
            match submitted {
                Some(record) if record.is_complete(submit_stages().len()) => {
                    info!(facts = record.facts.len(), "Seeding update from completed submission");
                    let mut seeded = record.facts;
                    ignored = seeded.fill_missing(&flags);
                    supplied = seeded;
                }
                Some(record) => {
                    return Err(StageError::precondition(format!(
                        "submission of '{repo_name}' stopped at stage {}; finish it with `submit` before updating",
                        record.stage_index + 1
                    ))
                    .into());
                }
                None => {
                    return Err(StageError::precondition(format!(
                        "no submission recorded for '{repo_name}'; run `submit` first"
                    ))
                    .into());
                }
            }
        }
        if !ignored.is_empty() {
            warn!(keys = ?ignored, "Ignoring supplied values for facts recorded by the submission");
        }

        let correlation_id = generate_correlation_id();
        let span = create_run_span(WorkflowMode::Update, &repo_name, &correlation_id);

        println!("🔁 Updating {repo_name} in Roam Depot");
        let stages = update_stages();
        let mut engine = WorkflowEngine::new(store, ctx.clone());
        let mut run = engine
            .run(WorkflowMode::Update, &stages, supplied)
            .instrument(span)
            .await?;
        for key in ignored {
            if !run.ignored_overrides.contains(&key) {
                run.ignored_overrides.push(key);
            }
        }
        Ok(run)
    }
}
