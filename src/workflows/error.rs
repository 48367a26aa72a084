//! Stage failure taxonomy
//!
//! Every stage failure is one of these kinds. The engine is the only place
//! that decides what a failure means for the run; stages just report.

use crate::checkpoint::CheckpointError;
use crate::external::{CommandError, GitError, GitHubError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// Network trouble or hosting-service rate limiting
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// A fact or resource a stage depends on is missing
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// External state exists and does not match what this run would produce
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Malformed or missing user-supplied input
    #[error("invalid input: {message}")]
    UserInput { message: String },

    /// An external tool failed; carries its diagnostic text
    #[error("{tool} failed: {message}")]
    Command { tool: String, message: String },

    #[error("file system error: {message}")]
    Io { message: String },
}

impl StageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Transient { .. } => "transient",
            StageError::Precondition { .. } => "precondition",
            StageError::Conflict { .. } => "conflict",
            StageError::UserInput { .. } => "user-input",
            StageError::Command { .. } => "command",
            StageError::Io { .. } => "io",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Transient { .. } | StageError::Command { .. } | StageError::Io { .. }
        )
    }

    /// Guidance printed after the failing stage's diagnostic.
    pub fn hint(&self) -> &'static str {
        match self {
            StageError::Transient { .. } => "This looks temporary. Re-run the same command to resume from this stage.",
            StageError::Precondition { .. } => {
                "Satisfy the prerequisite above; if the saved progress is damaged, re-run with --reset to start over."
            }
            StageError::Conflict { .. } => {
                "Resolve the conflicting state described above, then re-run to resume from this stage."
            }
            StageError::UserInput { .. } => "Fix the input value and re-run.",
            StageError::Command { .. } | StageError::Io { .. } => {
                "Fix the problem reported above, then re-run to resume from this stage."
            }
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        StageError::Conflict {
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        StageError::Precondition {
            message: message.into(),
        }
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        StageError::UserInput {
            message: message.into(),
        }
    }
}

impl From<CommandError> for StageError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::CommandNotFound { command } => StageError::Precondition {
                message: format!("`{command}` is not installed or not on PATH"),
            },
            CommandError::WorkingDirectoryMissing { path } => StageError::Precondition {
                message: format!("directory {path} does not exist"),
            },
            CommandError::Io { message } => StageError::Io { message },
        }
    }
}

impl From<GitError> for StageError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::Network { message } => StageError::Transient { message },
            GitError::PushRejected { remote, branch, message } => StageError::Conflict {
                message: format!("push of '{branch}' to '{remote}' was rejected (remote has diverged): {message}"),
            },
            GitError::Diverged { reference, message } => StageError::Conflict {
                message: format!("{reference} moved on in ways that cannot be fast-forwarded: {message}"),
            },
            GitError::AccessDenied { message } => StageError::Precondition {
                message: format!("git remote refused access; check your credentials and repository: {message}"),
            },
            GitError::RepositoryNotFound { path } => StageError::Precondition {
                message: format!("{path} is not a git repository"),
            },
            GitError::CommandError { source } => source.into(),
            GitError::GitCommandFailed { message } => StageError::Command {
                tool: "git".to_string(),
                message,
            },
        }
    }
}

impl From<GitHubError> for StageError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::RateLimitExceeded { message } | GitHubError::NetworkError { message } => {
                StageError::Transient { message }
            }
            GitHubError::AuthenticationFailed => StageError::Precondition {
                message: "GitHub CLI is not authenticated; run `gh auth login`".to_string(),
            },
            GitHubError::AlreadyExists { name } => StageError::Conflict {
                message: format!("repository already exists: {name}"),
            },
            GitHubError::CommandError { source } => source.into(),
            other @ (GitHubError::NotFound { .. }
            | GitHubError::InvalidResponse { .. }
            | GitHubError::CommandFailed { .. }) => StageError::Command {
                tool: "gh".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CheckpointError> for StageError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::Corrupted { .. } | CheckpointError::ModeMismatch { .. } => StageError::Precondition {
                message: err.to_string(),
            },
            CheckpointError::Io(e) => StageError::Io { message: e.to_string() },
            CheckpointError::Serialization(e) => StageError::Io { message: e.to_string() },
        }
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        StageError::Io {
            message: format!("{err:#}"),
        }
    }
}
