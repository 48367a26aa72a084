// Roam Depot Publisher - resumable publishing of Roam Research extensions
// This exposes the core components for testing and integration

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod external;
pub mod fs;
pub mod metadata;
pub mod prompt;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore, FileCheckpointStore, WorkflowMode};
pub use config::PublisherConfig;
pub use external::{
    CommandExecutor, GitClient, GitError, GitHubClient, GitHubError, GitHubOperations, GitOperations,
    ProcessCommandExecutor,
};
pub use fs::{FileSystemOperations, StandardFileSystem};
pub use prompt::{FactProvider, TerminalFactProvider};
pub use telemetry::{create_run_span, generate_correlation_id, init_telemetry};
pub use workflows::{
    EngineState, Stage, StageContext, StageError, WorkflowEngine, WorkflowFacts, WorkflowOutcome, WorkflowRun,
};
