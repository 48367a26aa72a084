use super::{checkpoint_store, resolve_repo_name};
use crate::checkpoint::{CheckpointStore, WorkflowMode};
use crate::cli::SubmitArgs;
use crate::prompt::FactProvider;
use crate::telemetry::{create_run_span, generate_correlation_id};
use crate::workflows::facts::keys;
use crate::workflows::{submit_stages, StageContext, StageError, WorkflowEngine, WorkflowFacts, WorkflowRun};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, Instrument};

/// Facts the submit workflow cannot start without
const REQUIRED_INPUTS: [(&str, &str); 3] = [
    (keys::EXTENSION_NAME, "Extension name"),
    (keys::DESCRIPTION, "Short description"),
    (keys::AUTHOR, "Author"),
];

pub struct SubmitCommand {
    args: SubmitArgs,
}

impl SubmitCommand {
    pub fn new(args: SubmitArgs) -> Self {
        Self { args }
    }

    /// Values passed on the command line, keyed by fact name
    fn flag_facts(&self) -> WorkflowFacts {
        let mut facts = WorkflowFacts::new();
        let flags = [
            (keys::REPO_NAME, &self.args.extension_repo_name),
            (keys::EXTENSION_NAME, &self.args.extension_name),
            (keys::DESCRIPTION, &self.args.extension_short_description),
            (keys::AUTHOR, &self.args.extension_author),
            (keys::TAGS, &self.args.extension_tags),
            (keys::STRIPE_ACCOUNT, &self.args.stripe_account),
            (keys::EXTENSION_SOURCE_PATH, &self.args.extension_file_path),
            (keys::EXTENSION_JS_CODE, &self.args.extension_js_code),
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
        let mut supplied = self.flag_facts();
        let repo_name = resolve_repo_name(&supplied, provider)?;
        supplied.insert(keys::REPO_NAME, repo_name.clone());

        let store = checkpoint_store(ctx, &repo_name);
        if self.args.reset {
            store.clear(WorkflowMode::Submit).await?;
            store.clear(WorkflowMode::Update).await?;
            println!("🧹 Cleared saved progress for {repo_name}");
        }

        let checkpoint = store.load(WorkflowMode::Submit).await.map_err(StageError::from)?;
        let fresh = checkpoint.is_none();
        let recorded = checkpoint.map(|record| record.facts).unwrap_or_default();

        // Prompt only for what neither the checkpoint nor the flags provide
        let mut known = recorded.clone();
        known.fill_missing(&supplied);
        for (key, question) in REQUIRED_INPUTS {
            if !known.contains(key) {
                let value = provider.get_or_prompt(&known, key, question)?;
                known.insert(key, value.clone());
                supplied.insert(key, value);
            }
        }

        if fresh && !known.contains(keys::EXTENSION_SOURCE_PATH) && !known.contains(keys::EXTENSION_JS_CODE) {
            if let Some(code) = provider.read_multiline("Paste the contents of extension.js")? {
                supplied.insert(keys::EXTENSION_JS_CODE, code);
            }
        }

        // Recorded paths are absolute, so compare like with like; only a path
        // that will actually be used has to exist
        if let Some(path) = supplied.get(keys::EXTENSION_SOURCE_PATH).map(str::to_string) {
            let resolved = if recorded.contains(keys::EXTENSION_SOURCE_PATH) {
                absolute_source_path(&ctx.workspace, &path)
            } else {
                resolve_source_file(&ctx.workspace, &path)?
            };
            supplied.insert(keys::EXTENSION_SOURCE_PATH, resolved);
        }

        if !known.contains(keys::DEPOT_FOLDER) {
            supplied.insert(keys::DEPOT_FOLDER, ctx.config.workspace.depot_folder.clone());
        }

        if !known.contains(keys::GITHUB_USERNAME) {
            let user = ctx
                .github
                .authenticated_user()
                .await
                .map_err(StageError::from)
                .context("Could not determine your GitHub username; run `gh auth login`")?;
            info!(user = %user, "Detected GitHub user");
            supplied.insert(keys::GITHUB_USERNAME, user);
        }

        let correlation_id = generate_correlation_id();
        let span = create_run_span(WorkflowMode::Submit, &repo_name, &correlation_id);

        println!("🚀 Submitting {repo_name} to Roam Depot");
        let stages = submit_stages();
        let mut engine = WorkflowEngine::new(store, ctx.clone());
        let run = engine
            .run(WorkflowMode::Submit, &stages, supplied)
            .instrument(span)
            .await?;
        Ok(run)
    }
}

fn absolute_source_path(workspace: &Path, path: &str) -> String {
    workspace.join(path).display().to_string()
}

/// Absolute path of the extension file, failing before any stage runs when it is missing
fn resolve_source_file(workspace: &Path, path: &str) -> Result<String, StageError> {
    if !workspace.join(path).is_file() {
        return Err(StageError::user_input(format!(
            "extension file '{path}' does not exist"
        )));
    }
    Ok(absolute_source_path(workspace, path))
}
