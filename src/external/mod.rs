//! External tool abstractions
//!
//! This module provides trait-based abstractions for the external CLI tools the
//! publishing stages drive (`git` and the GitHub CLI), enabling testable code
//! through dependency injection and mock implementations.
//!
//! Pure decision making lives in the stages; this layer only runs commands and
//! turns exit codes and stderr into structured outcomes.

pub mod command;
pub mod git;
pub mod github;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use git::{GitClient, GitError, GitOperations};
pub use github::{GitHubClient, GitHubError, GitHubOperations, PrConfig, PullRequestInfo, RepoConfig, RepoInfo};
