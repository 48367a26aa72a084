//! Stage bodies of the submit and update workflows
//!
//! Each stage checks the external state it is about to change and skips the
//! change when it is already in place, so any stage can be re-run safely.

mod fork;
mod local;
mod metadata;
mod pull_request;

pub use fork::{CloneOrUpdateFork, DetectOrForkRegistryRepo, PushForkBranch};
pub use local::{CommitCodeChanges, CommitInitial, CreateRemoteRepo, InitLocalRepo, PushMaster, SetBranchMaster};
pub use metadata::{CommitMetadata, CommitMetadataUpdate, UpdateMetadataSourceCommit, WriteMetadataFile};
pub use pull_request::OpenPullRequest;

use super::error::StageError;
use super::stage::StageContext;
use crate::external::git::CommitHash;
use std::path::Path;
use tracing::info;

/// `owner/name` (lowercased) of a GitHub URL in https or ssh form
pub(crate) fn repo_slug(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let path = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("git@github.com:"))
        .or_else(|| trimmed.strip_prefix("ssh://git@github.com/"))?;

    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Some(format!("{}/{}", owner.to_lowercase(), name.to_lowercase()))
        }
        _ => None,
    }
}

pub(crate) fn same_repo(url: &str, full_name: &str) -> bool {
    repo_slug(url).is_some_and(|slug| slug == full_name.to_lowercase())
}

/// Make `branch` the checked-out branch, creating it from HEAD when it exists
/// neither locally nor on `remote`.
pub(crate) async fn switch_to_branch(
    ctx: &StageContext,
    dir: &Path,
    branch: &str,
    remote: Option<&str>,
) -> Result<(), StageError> {
    if ctx.git.current_branch(dir).await?.as_deref() == Some(branch) {
        return Ok(());
    }

    let on_remote = match remote {
        Some(remote) => ctx.git.remote_branch_exists(dir, remote, branch).await?,
        None => false,
    };

    if on_remote || ctx.git.branch_exists(dir, branch).await? {
        ctx.git.checkout(dir, branch).await?;
    } else {
        ctx.git.create_branch(dir, branch).await?;
    }
    Ok(())
}

/// Commit whatever is staged; `None` when the index already matches HEAD.
pub(crate) async fn commit_if_staged(
    ctx: &StageContext,
    dir: &Path,
    message: &str,
) -> Result<Option<CommitHash>, StageError> {
    if !ctx.git.has_staged_changes(dir).await? {
        info!(dir = ?dir, "Nothing staged; commit already in place");
        return Ok(None);
    }
    Ok(Some(ctx.git.commit(dir, message).await?))
}

/// HEAD of `dir`, failing when the repository has no commits yet.
pub(crate) async fn require_head(ctx: &StageContext, dir: &Path) -> Result<CommitHash, StageError> {
    ctx.git.head_commit(dir).await?.ok_or_else(|| {
        StageError::precondition(format!("repository {} has no commits", dir.display()))
    })
}
