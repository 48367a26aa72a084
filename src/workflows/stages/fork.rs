//! Stages acting on the user's fork of the extension registry

use super::same_repo;
use crate::workflows::error::StageError;
use crate::workflows::facts::{keys, WorkflowFacts};
use crate::workflows::stage::{Stage, StageContext};
use async_trait::async_trait;
use tracing::{info, warn};

/// Branch in the fork that carries the metadata change for `repo_name`
pub fn fork_branch_name(repo_name: &str) -> String {
    format!("add-{repo_name}")
}

pub struct DetectOrForkRegistryRepo;

#[async_trait]
impl Stage for DetectOrForkRegistryRepo {
    fn name(&self) -> &'static str {
        "detect-or-fork-registry-repo"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::GITHUB_USERNAME]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let registry = &ctx.config.registry.repo;
        let fork_name = format!("{}/{}", facts.require(keys::GITHUB_USERNAME)?, ctx.config.registry.fork_name);

        let fork = match ctx.github.view_repo(&fork_name).await? {
            Some(existing) => {
                let forked_from_registry = existing
                    .parent
                    .as_deref()
                    .is_some_and(|parent| parent.eq_ignore_ascii_case(registry));
                if !existing.is_fork || !forked_from_registry {
                    return Err(StageError::conflict(format!(
                        "{fork_name} exists but is not a fork of {registry}; rename or delete it first"
                    )));
                }
                info!(fork = %existing.name_with_owner, "Registry fork already exists");
                existing
            }
            None => {
                info!(registry = %registry, "Forking registry");
                ctx.github.fork_repo(registry).await?;
                ctx.github.view_repo(&fork_name).await?.ok_or_else(|| {
                    StageError::Transient {
                        message: format!("fork {fork_name} is not visible yet"),
                    }
                })?
            }
        };

        Ok(WorkflowFacts::new()
            .with(keys::FORK_REPO, fork.name_with_owner)
            .with(keys::FORK_URL, fork.url))
    }
}

pub struct CloneOrUpdateFork;

#[async_trait]
impl Stage for CloneOrUpdateFork {
    fn name(&self) -> &'static str {
        "clone-or-update-fork"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::FORK_REPO, keys::FORK_URL, keys::REPO_NAME, keys::DEPOT_FOLDER]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let fork_repo = facts.require(keys::FORK_REPO)?;
        let remote = &ctx.config.registry.fork_remote;
        let dir = ctx.depot_dir(facts.require(keys::DEPOT_FOLDER)?);

        if !ctx.fs.exists(&dir) {
            let url = format!("{}.git", facts.require(keys::FORK_URL)?);
            ctx.git.clone_repo(&url, &dir).await?;
        } else {
            if !ctx.git.is_repository(&dir).await? {
                return Err(StageError::conflict(format!(
                    "{} exists but is not a git repository; pass another --depot-folder",
                    dir.display()
                )));
            }
            match ctx.git.remote_url(&dir, remote).await? {
                Some(url) if same_repo(&url, fork_repo) => {}
                other => {
                    return Err(StageError::conflict(format!(
                        "{} is not a clone of {fork_repo} (remote '{remote}' is {})",
                        dir.display(),
                        other.as_deref().unwrap_or("missing")
                    )));
                }
            }
            ctx.git.fetch(&dir, remote).await?;
        }

        let branch = fork_branch_name(facts.require(keys::REPO_NAME)?);
        let current = ctx.git.current_branch(&dir).await?;
        if current.as_deref() != Some(branch.as_str()) {
            let known = ctx.git.branch_exists(&dir, &branch).await?
                || ctx.git.remote_branch_exists(&dir, remote, &branch).await?;
            if known {
                ctx.git.checkout(&dir, &branch).await?;
            } else {
                // New branches start from the registry's base branch
                ctx.git.checkout(&dir, &ctx.config.registry.base_branch).await?;
                ctx.git.create_branch(&dir, &branch).await?;
            }
        }

        Ok(WorkflowFacts::new()
            .with(keys::DEPOT_PATH, dir.display().to_string())
            .with(keys::FORK_BRANCH, branch))
    }
}

pub struct PushForkBranch;

#[async_trait]
impl Stage for PushForkBranch {
    fn name(&self) -> &'static str {
        "push-fork-branch"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::DEPOT_PATH, keys::FORK_BRANCH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.depot(facts)?;
        let branch = facts.require(keys::FORK_BRANCH)?;

        if let Err(e) = ctx.git.push(&dir, &ctx.config.registry.fork_remote, branch).await {
            warn!(branch = %branch, error = %e, "Push of fork branch failed");
            return Err(e.into());
        }
        Ok(WorkflowFacts::new())
    }
}
