//! Stages writing and committing the registry metadata document

use super::{commit_if_staged, require_head, switch_to_branch};
use crate::metadata::{read_field, rewrite_source_commit, source_url, ExtensionMetadata, MetadataError};
use crate::workflows::error::StageError;
use crate::workflows::facts::{keys, parse_tags, WorkflowFacts};
use crate::workflows::stage::{Stage, StageContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

fn metadata_relative_path(ctx: &StageContext, user: &str, repo_name: &str) -> String {
    format!("{}/{user}/{repo_name}.json", ctx.config.registry.metadata_dir)
}

fn render_error(e: MetadataError) -> StageError {
    StageError::Io {
        message: format!("failed to render metadata: {e}"),
    }
}

/// Check out the fork branch in the registry clone and return the clone path
async fn prepare_depot(ctx: &StageContext, facts: &WorkflowFacts) -> Result<PathBuf, StageError> {
    let depot = ctx.depot(facts)?;
    let branch = facts.require(keys::FORK_BRANCH)?;
    switch_to_branch(ctx, &depot, branch, Some(&ctx.config.registry.fork_remote)).await?;
    Ok(depot)
}

/// Pick up commits pushed to the fork branch from elsewhere, such as review
/// edits made on the pull request, so the next push stays a fast-forward.
async fn sync_fork_branch(ctx: &StageContext, depot: &Path, branch: &str) -> Result<(), StageError> {
    let remote = &ctx.config.registry.fork_remote;
    ctx.git.fetch(depot, remote).await?;
    if ctx.git.remote_branch_exists(depot, remote, branch).await? {
        ctx.git.fast_forward(depot, remote, branch).await?;
    }
    Ok(())
}

pub struct WriteMetadataFile;

#[async_trait]
impl Stage for WriteMetadataFile {
    fn name(&self) -> &'static str {
        "write-metadata-file"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[
            keys::GITHUB_USERNAME,
            keys::REPO_NAME,
            keys::EXTENSION_NAME,
            keys::DESCRIPTION,
            keys::AUTHOR,
            keys::LOCAL_REPO_PATH,
            keys::DEPOT_PATH,
            keys::FORK_BRANCH,
        ]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let user = facts.require(keys::GITHUB_USERNAME)?;
        let repo_name = facts.require(keys::REPO_NAME)?;
        let source_commit = require_head(ctx, &ctx.local_repo(facts)?).await?;
        let depot = prepare_depot(ctx, facts).await?;

        let url = source_url(user, repo_name);
        let metadata = ExtensionMetadata {
            name: facts.require(keys::EXTENSION_NAME)?.to_string(),
            short_description: facts.require(keys::DESCRIPTION)?.to_string(),
            author: facts.require(keys::AUTHOR)?.to_string(),
            tags: facts.get(keys::TAGS).map(parse_tags).unwrap_or_default(),
            source_repo: format!("{url}.git"),
            source_url: url.clone(),
            source_commit: source_commit.clone(),
            stripe_account: facts
                .get(keys::STRIPE_ACCOUNT)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        let rendered = metadata.render().map_err(render_error)?;

        let relative = metadata_relative_path(ctx, user, repo_name);
        let path = depot.join(&relative);

        if ctx.fs.exists(&path) {
            let existing = ctx.fs.read_to_string(&path).await?;
            if existing == rendered {
                info!(path = ?path, "Metadata already up to date");
                return Ok(delta(relative, source_commit));
            }
            match read_field(&existing, "source_url") {
                Ok(Some(found)) if found == url => {
                    info!(path = ?path, "Refreshing metadata written by an earlier run");
                }
                _ => {
                    return Err(StageError::conflict(format!(
                        "{} already exists in the registry and does not describe {url}",
                        relative
                    )));
                }
            }
        }

        if let Some(parent) = path.parent() {
            ctx.fs.create_dir_all(parent).await?;
        }
        ctx.fs.write(&path, rendered.as_bytes()).await?;

        Ok(delta(relative, source_commit))
    }
}

fn delta(relative: String, source_commit: String) -> WorkflowFacts {
    WorkflowFacts::new()
        .with(keys::METADATA_PATH, relative)
        .with(keys::SOURCE_COMMIT, source_commit)
}

pub struct CommitMetadata;

#[async_trait]
impl Stage for CommitMetadata {
    fn name(&self) -> &'static str {
        "commit-metadata"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::REPO_NAME, keys::DEPOT_PATH, keys::FORK_BRANCH, keys::METADATA_PATH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let depot = prepare_depot(ctx, facts).await?;
        ctx.git.stage_path(&depot, facts.require(keys::METADATA_PATH)?).await?;

        let message = format!("Add {} metadata for Roam extension", facts.require(keys::REPO_NAME)?);
        let commit = match commit_if_staged(ctx, &depot, &message).await? {
            Some(commit) => commit,
            None => require_head(ctx, &depot).await?,
        };

        Ok(WorkflowFacts::new().with(keys::METADATA_COMMIT, commit))
    }
}

pub struct UpdateMetadataSourceCommit;

#[async_trait]
impl Stage for UpdateMetadataSourceCommit {
    fn name(&self) -> &'static str {
        "update-metadata-source-commit"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::LOCAL_REPO_PATH, keys::DEPOT_PATH, keys::FORK_BRANCH, keys::METADATA_PATH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let head = require_head(ctx, &ctx.local_repo(facts)?).await?;
        let depot = prepare_depot(ctx, facts).await?;
        sync_fork_branch(ctx, &depot, facts.require(keys::FORK_BRANCH)?).await?;

        let relative = facts.require(keys::METADATA_PATH)?;
        let path = depot.join(relative);
        if !ctx.fs.exists(&path) {
            return Err(StageError::precondition(format!(
                "metadata file {relative} is missing from the registry clone; run submit again"
            )));
        }

        let raw = ctx.fs.read_to_string(&path).await?;
        let recorded = read_field(&raw, "source_commit").map_err(|e| unreadable(&path, e))?;

        if recorded.as_deref() == Some(head.as_str()) {
            info!(commit = %head, "Metadata already points at the current commit");
        } else {
            let rewritten = rewrite_source_commit(&raw, &head).map_err(|e| unreadable(&path, e))?;
            ctx.fs.write(&path, rewritten.as_bytes()).await?;
        }

        Ok(WorkflowFacts::new().with(keys::SOURCE_COMMIT, head))
    }
}

fn unreadable(path: &Path, e: MetadataError) -> StageError {
    StageError::conflict(format!("cannot update {}: {e}", path.display()))
}

pub struct CommitMetadataUpdate;

#[async_trait]
impl Stage for CommitMetadataUpdate {
    fn name(&self) -> &'static str {
        "commit-metadata-update"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::DEPOT_PATH, keys::FORK_BRANCH, keys::METADATA_PATH, keys::SOURCE_COMMIT]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let depot = prepare_depot(ctx, facts).await?;
        ctx.git.stage_path(&depot, facts.require(keys::METADATA_PATH)?).await?;

        let message = format!("Update source_commit to {}", facts.require(keys::SOURCE_COMMIT)?);
        match commit_if_staged(ctx, &depot, &message).await? {
            Some(commit) => Ok(WorkflowFacts::new().with(keys::METADATA_COMMIT, commit)),
            None => Ok(WorkflowFacts::new()),
        }
    }
}
