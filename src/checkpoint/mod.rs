//! Durable checkpoint storage
//!
//! One JSON record per extension and workflow mode, replaced atomically so a
//! crash mid-write never leaves a torn file behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::workflows::facts::WorkflowFacts;

/// Which user-facing verb a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    Submit,
    Update,
}

impl WorkflowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowMode::Submit => "submit",
            WorkflowMode::Update => "update",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progress of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    /// Index of the next stage to run; equals the stage count once complete
    pub stage_index: usize,
    pub facts: WorkflowFacts,
    pub mode: WorkflowMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CheckpointRecord {
    pub fn new(mode: WorkflowMode, facts: WorkflowFacts) -> Self {
        Self {
            stage_index: 0,
            facts,
            mode,
            updated_at: None,
        }
    }

    pub fn is_complete(&self, stage_count: usize) -> bool {
        self.stage_index >= stage_count
    }
}

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("checkpoint {path} records mode '{found}' but was loaded as '{expected}'")]
    ModeMismatch {
        path: String,
        expected: WorkflowMode,
        found: WorkflowMode,
    },
}

/// Trait for checkpoint persistence, scoped to a single extension
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the persisted record for `mode`, `None` when nothing was saved
    async fn load(&self, mode: WorkflowMode) -> Result<Option<CheckpointRecord>, CheckpointError>;

    /// Atomically replace the persisted record for `record.mode`
    async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError>;

    /// Remove the persisted record for `mode`; succeeds when there is none
    async fn clear(&self, mode: WorkflowMode) -> Result<(), CheckpointError>;
}

/// File system implementation storing `<state_dir>/<extension>/<mode>.json`
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(state_dir: &Path, extension: &str) -> Self {
        Self {
            dir: state_dir.join(extension),
        }
    }

    pub fn path_for(&self, mode: WorkflowMode) -> PathBuf {
        self.dir.join(format!("{mode}.json"))
    }

    fn temp_path_for(&self, mode: WorkflowMode) -> PathBuf {
        self.dir.join(format!("{mode}.json.tmp"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, mode: WorkflowMode) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let path = self.path_for(mode);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = ?path, "No existing checkpoint found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: CheckpointRecord =
            serde_json::from_str(&contents).map_err(|e| CheckpointError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if record.mode != mode {
            return Err(CheckpointError::ModeMismatch {
                path: path.display().to_string(),
                expected: mode,
                found: record.mode,
            });
        }

        info!(
            file = ?path,
            stage_index = record.stage_index,
            facts = record.facts.len(),
            "Checkpoint loaded"
        );
        Ok(Some(record))
    }

    async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir).await?;

        let mut to_save = record.clone();
        to_save.updated_at = Some(Utc::now());
        let serialized = serde_json::to_string_pretty(&to_save)?;

        let path = self.path_for(record.mode);
        let temp_path = self.temp_path_for(record.mode);

        // Write to temporary file first, then rename (atomic operation)
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(serialized.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &path).await?;

        debug!(file = ?path, stage_index = record.stage_index, "Checkpoint saved");
        Ok(())
    }

    async fn clear(&self, mode: WorkflowMode) -> Result<(), CheckpointError> {
        for path in [self.path_for(mode), self.temp_path_for(mode)] {
            match fs::remove_file(&path).await {
                Ok(()) => info!(file = ?path, "Checkpoint removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
