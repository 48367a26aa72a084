//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external commands, enabling
//! dependency injection for testing. A non-zero exit status is never an error
//! at this layer: callers receive the full [`CommandOutput`] and decide what
//! the failure means.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    /// Best diagnostic text for a failed invocation.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Working directory does not exist: {path}")]
    WorkingDirectoryMissing { path: String },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
///
/// This abstraction allows the rest of the codebase to execute commands
/// without directly depending on the process API, enabling testing
/// with mock implementations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Real implementation spawning a subprocess and waiting for it to exit
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        let mut command = tokio::process::Command::new(program);
        command.args(args);

        if let Some(dir) = working_dir {
            if !dir.is_dir() {
                return Err(CommandError::WorkingDirectoryMissing {
                    path: dir.display().to_string(),
                });
            }
            command.current_dir(dir);
        }

        debug!(program, args = ?args, cwd = ?working_dir, "Running external command");

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: program.to_string(),
                }
            } else {
                CommandError::Io {
                    message: e.to_string(),
                }
            }
        })?;

        let output = CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!(program, status = output.status_code, "External command finished");
        Ok(output)
    }
}
