//! File system operations abstraction for testing
//!
//! This module provides a trait-based abstraction over the file system
//! operations the stages perform (scaffolding the extension repository,
//! writing registry metadata) that can be easily mocked in tests using the
//! `mockall` crate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use roam_depot_publisher::fs::{FileSystemOperations, StandardFileSystem};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let fs_ops: Arc<dyn FileSystemOperations> = Arc::new(StandardFileSystem);
//!
//!     fs_ops.create_dir_all(Path::new("my-extension")).await?;
//!     fs_ops.write(Path::new("my-extension/README.md"), b"# My Extension\n").await?;
//!
//!     if fs_ops.exists(Path::new("my-extension/README.md")) {
//!         println!("README was created successfully");
//!     }
//!
//!     Ok(())
//! }
//! ```
use anyhow::Result;
use std::path::Path;

/// Trait for file system operations that can be mocked in tests
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and all its parent directories
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Write data to a file, creating the file if it doesn't exist
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Read a whole file as UTF-8
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// Standard implementation that uses actual file system operations
///
/// This is the production implementation of `FileSystemOperations`. Use this
/// in production code and switch to `MockFileSystemOperations` in tests.
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(Into::into)
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        tokio::fs::write(path, contents).await.map_err(Into::into)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.map_err(Into::into)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
