//! Git command abstractions
//!
//! Provides trait-based abstractions for Git operations, enabling testable
//! Git integrations through dependency injection. Every operation names the
//! repository directory explicitly; nothing relies on the process cwd.

use super::command::{CommandError, CommandExecutor, CommandOutput};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub type BranchName = String;
pub type CommitHash = String;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository: {path}")]
    RepositoryNotFound { path: String },
    #[error("Push of {branch} to {remote} was rejected: {message}")]
    PushRejected {
        remote: String,
        branch: BranchName,
        message: String,
    },
    #[error("{reference} has commits the local branch does not: {message}")]
    Diverged { reference: String, message: String },
    #[error("Git remote refused access: {message}")]
    AccessDenied { message: String },
    #[error("Network error talking to git remote: {message}")]
    Network { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("Git command failed: {message}")]
    GitCommandFailed { message: String },
}

/// Checked before the network markers: git reports refused credentials and
/// missing remotes with the same trailing lines as unreachable hosts.
const ACCESS_MARKERS: &[&str] = &[
    "Authentication failed",
    "Permission denied",
    "Permission to",
    "returned error: 403",
    "could not read Username",
    "Repository not found",
];

const NETWORK_MARKERS: &[&str] = &[
    "Could not resolve host",
    "Failed to connect",
    "Connection timed out",
    "Connection refused",
    "Connection reset",
    "Operation timed out",
    "early EOF",
];

/// Trait for Git repository operations
///
/// This abstraction enables testing stage logic without actual repository
/// manipulation, while preserving the exact interface used by the application.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Whether `dir` is the top level of a git work tree
    async fn is_repository(&self, dir: &Path) -> Result<bool, GitError>;

    /// Initialize a new repository in `dir`
    async fn init(&self, dir: &Path) -> Result<(), GitError>;

    /// Branch HEAD points at (also for an unborn branch), `None` when detached
    async fn current_branch(&self, dir: &Path) -> Result<Option<BranchName>, GitError>;

    /// Commit HEAD resolves to, `None` before the first commit
    async fn head_commit(&self, dir: &Path) -> Result<Option<CommitHash>, GitError>;

    /// Check if a branch exists locally
    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<bool, GitError>;

    /// Check if a remote-tracking branch exists
    async fn remote_branch_exists(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool, GitError>;

    /// Checkout an existing (or remote-tracking) branch
    async fn checkout(&self, dir: &Path, branch: &str) -> Result<(), GitError>;

    /// Create a new branch from the current HEAD and switch to it
    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError>;

    /// Stage every change in the work tree
    async fn stage_all(&self, dir: &Path) -> Result<(), GitError>;

    /// Stage a single path
    async fn stage_path(&self, dir: &Path, path: &str) -> Result<(), GitError>;

    /// Whether the index differs from HEAD
    async fn has_staged_changes(&self, dir: &Path) -> Result<bool, GitError>;

    /// Commit the index and return the new HEAD
    async fn commit(&self, dir: &Path, message: &str) -> Result<CommitHash, GitError>;

    /// URL configured for `remote`, `None` when the remote does not exist
    async fn remote_url(&self, dir: &Path, remote: &str) -> Result<Option<String>, GitError>;

    /// Add a remote
    async fn add_remote(&self, dir: &Path, remote: &str, url: &str) -> Result<(), GitError>;

    /// Push a branch and set its upstream
    async fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Fetch from a remote
    async fn fetch(&self, dir: &Path, remote: &str) -> Result<(), GitError>;

    /// Fast-forward the checked-out branch to `remote/branch`. A no-op when
    /// the local branch already contains it.
    async fn fast_forward(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Clone `url` into `dest`
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;
}

/// Real Git implementation
pub struct GitClient {
    executor: Arc<dyn CommandExecutor>,
}

impl GitClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<CommandOutput, GitError> {
        Ok(self.executor.execute("git", args, Some(dir)).await?)
    }

    async fn execute_git_command(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(dir, args).await?;

        if !output.success() {
            return Err(classify_git_error(dir, &output.diagnostic(), args));
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Runs a query whose exit status 1 means "no" rather than failure.
    async fn probe(&self, dir: &Path, args: &[&str]) -> Result<Option<String>, GitError> {
        let output = self.run(dir, args).await?;
        match output.status_code {
            0 => Ok(Some(output.stdout.trim().to_string())),
            1 => Ok(None),
            _ => Err(classify_git_error(dir, &output.diagnostic(), args)),
        }
    }
}

fn classify_git_error(dir: &Path, stderr: &str, args: &[&str]) -> GitError {
    if stderr.contains("not a git repository") {
        GitError::RepositoryNotFound {
            path: dir.display().to_string(),
        }
    } else if args.first() == Some(&"push")
        && (stderr.contains("[rejected]") || stderr.contains("non-fast-forward") || stderr.contains("fetch first"))
    {
        GitError::PushRejected {
            remote: args.get(2).unwrap_or(&"unknown").to_string(),
            branch: args.get(3).unwrap_or(&"unknown").to_string(),
            message: stderr.to_string(),
        }
    } else if args.first() == Some(&"merge") && stderr.contains("Not possible to fast-forward") {
        GitError::Diverged {
            reference: args.last().unwrap_or(&"unknown").to_string(),
            message: stderr.to_string(),
        }
    } else if ACCESS_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        GitError::AccessDenied {
            message: stderr.to_string(),
        }
    } else if NETWORK_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        GitError::Network {
            message: stderr.to_string(),
        }
    } else {
        GitError::GitCommandFailed {
            message: format!("git {}: {}", args.join(" "), stderr),
        }
    }
}

#[async_trait]
impl GitOperations for GitClient {
    async fn is_repository(&self, dir: &Path) -> Result<bool, GitError> {
        if !dir.is_dir() {
            return Ok(false);
        }

        let output = self.run(dir, &["rev-parse", "--show-toplevel"]).await?;
        if !output.success() {
            return Ok(false);
        }

        // A directory nested inside some other work tree is not a repository of its own
        let toplevel = Path::new(output.stdout.trim());
        match (toplevel.canonicalize(), dir.canonicalize()) {
            (Ok(top), Ok(wanted)) => Ok(top == wanted),
            _ => Ok(false),
        }
    }

    async fn init(&self, dir: &Path) -> Result<(), GitError> {
        self.execute_git_command(dir, &["init"]).await?;
        Ok(())
    }

    async fn current_branch(&self, dir: &Path) -> Result<Option<BranchName>, GitError> {
        self.probe(dir, &["symbolic-ref", "--quiet", "--short", "HEAD"]).await
    }

    async fn head_commit(&self, dir: &Path) -> Result<Option<CommitHash>, GitError> {
        self.probe(dir, &["rev-parse", "--verify", "--quiet", "HEAD"]).await
    }

    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/heads/{branch}");
        Ok(self
            .probe(dir, &["show-ref", "--verify", "--quiet", &reference])
            .await?
            .is_some())
    }

    async fn remote_branch_exists(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/remotes/{remote}/{branch}");
        Ok(self
            .probe(dir, &["show-ref", "--verify", "--quiet", &reference])
            .await?
            .is_some())
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.execute_git_command(dir, &["checkout", branch]).await?;
        Ok(())
    }

    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.execute_git_command(dir, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn stage_all(&self, dir: &Path) -> Result<(), GitError> {
        self.execute_git_command(dir, &["add", "--all"]).await?;
        Ok(())
    }

    async fn stage_path(&self, dir: &Path, path: &str) -> Result<(), GitError> {
        self.execute_git_command(dir, &["add", "--", path]).await?;
        Ok(())
    }

    async fn has_staged_changes(&self, dir: &Path) -> Result<bool, GitError> {
        // `--quiet` exits 1 when the index differs from HEAD
        Ok(self
            .probe(dir, &["diff", "--cached", "--quiet"])
            .await?
            .is_none())
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<CommitHash, GitError> {
        self.execute_git_command(dir, &["commit", "-m", message]).await?;
        self.head_commit(dir).await?.ok_or_else(|| GitError::GitCommandFailed {
            message: "HEAD does not resolve after commit".to_string(),
        })
    }

    async fn remote_url(&self, dir: &Path, remote: &str) -> Result<Option<String>, GitError> {
        let output = self.run(dir, &["remote", "get-url", remote]).await?;
        if output.success() {
            return Ok(Some(output.stdout.trim().to_string()));
        }

        let diagnostic = output.diagnostic();
        if diagnostic.contains("No such remote") {
            Ok(None)
        } else {
            Err(classify_git_error(dir, &diagnostic, &["remote", "get-url", remote]))
        }
    }

    async fn add_remote(&self, dir: &Path, remote: &str, url: &str) -> Result<(), GitError> {
        self.execute_git_command(dir, &["remote", "add", remote, url]).await?;
        Ok(())
    }

    async fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        // classify_git_error reads remote and branch from argument positions 2 and 3
        self.execute_git_command(dir, &["push", "--set-upstream", remote, branch])
            .await?;
        Ok(())
    }

    async fn fetch(&self, dir: &Path, remote: &str) -> Result<(), GitError> {
        self.execute_git_command(dir, &["fetch", remote]).await?;
        Ok(())
    }

    async fn fast_forward(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let upstream = format!("{remote}/{branch}");
        self.execute_git_command(dir, &["merge", "--ff-only", &upstream]).await?;
        Ok(())
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dest_str = dest.display().to_string();
        self.execute_git_command(parent, &["clone", url, &dest_str]).await?;
        Ok(())
    }
}
