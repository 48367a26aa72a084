use crate::checkpoint::FileCheckpointStore;
use crate::prompt::FactProvider;
use crate::workflows::facts::{keys, validate_repo_name};
use crate::workflows::{StageContext, StageError, WorkflowFacts, WorkflowOutcome, WorkflowRun};
use std::sync::Arc;

pub mod submit;
pub mod update;

pub use submit::SubmitCommand;
pub use update::UpdateCommand;

/// The repository name scopes every checkpoint, so it is collected first.
pub(crate) fn resolve_repo_name(
    supplied: &WorkflowFacts,
    provider: &mut dyn FactProvider,
) -> Result<String, StageError> {
    let name = provider.get_or_prompt(supplied, keys::REPO_NAME, "Extension repository name")?;
    validate_repo_name(&name)?;
    Ok(name)
}

pub(crate) fn checkpoint_store(ctx: &StageContext, repo_name: &str) -> Arc<FileCheckpointStore> {
    Arc::new(FileCheckpointStore::new(&ctx.state_dir(), repo_name))
}

/// Print the closing lines for a finished run
pub fn print_summary(run: &WorkflowRun) {
    for key in &run.ignored_overrides {
        println!("⚠️  Kept the recorded value of '{key}'; the newly supplied value was ignored");
    }

    match &run.outcome {
        WorkflowOutcome::Completed { facts } => {
            if run.stages_run.is_empty() {
                println!("✅ Nothing to do: every stage already completed");
            } else {
                println!("✅ Completed {} stage(s)", run.stages_run.len());
            }
            if let Some(url) = facts.get(keys::PR_URL) {
                println!("🔗 Pull request: {url}");
            }
            if let Some(commit) = facts.get(keys::SOURCE_COMMIT) {
                println!("📌 Registry metadata points at {commit}");
            }
        }
        WorkflowOutcome::Failed { stage, error, .. } => {
            eprintln!("❌ Stage '{stage}' failed: {error}");
            eprintln!("💡 {}", error.hint());
        }
    }
}
