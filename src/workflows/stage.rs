//! Stage definition and the capabilities stages run against

use super::error::StageError;
use super::facts::{keys, WorkflowFacts};
use crate::config::PublisherConfig;
use crate::external::{GitOperations, GitHubOperations};
use crate::fs::FileSystemOperations;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a stage may touch. Stages hold no state of their own.
#[derive(Clone)]
pub struct StageContext {
    pub git: Arc<dyn GitOperations>,
    pub github: Arc<dyn GitHubOperations>,
    pub fs: Arc<dyn FileSystemOperations>,
    pub config: Arc<PublisherConfig>,
    /// Invocation directory all relative paths resolve against
    pub workspace: PathBuf,
}

impl StageContext {
    pub fn new(
        git: Arc<dyn GitOperations>,
        github: Arc<dyn GitHubOperations>,
        fs: Arc<dyn FileSystemOperations>,
        config: Arc<PublisherConfig>,
        workspace: PathBuf,
    ) -> Self {
        Self {
            git,
            github,
            fs,
            config,
            workspace,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(&self.config.workspace.state_dir)
    }

    pub fn extension_dir(&self, repo_name: &str) -> PathBuf {
        self.workspace.join(repo_name)
    }

    pub fn depot_dir(&self, depot_folder: &str) -> PathBuf {
        self.workspace.join(depot_folder)
    }

    /// Local extension repository recorded by init-local-repo
    pub fn local_repo(&self, facts: &WorkflowFacts) -> Result<PathBuf, StageError> {
        existing_dir(facts.require(keys::LOCAL_REPO_PATH)?)
    }

    /// Registry fork clone recorded by clone-or-update-fork
    pub fn depot(&self, facts: &WorkflowFacts) -> Result<PathBuf, StageError> {
        existing_dir(facts.require(keys::DEPOT_PATH)?)
    }
}

fn existing_dir(path: &str) -> Result<PathBuf, StageError> {
    let path = Path::new(path);
    if !path.is_dir() {
        return Err(StageError::precondition(format!(
            "directory {} recorded by an earlier stage no longer exists",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// One idempotent step of a publishing workflow.
///
/// `run` receives a read view of the facts and returns only the facts it
/// produced. Re-running a stage whose effect already happened must detect
/// that and succeed without repeating the effect.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Facts that must be present before the stage may run
    fn required_facts(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError>;
}
