//! Registry metadata document for one extension

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("metadata must be a JSON object")]
    NotAnObject,
}

/// The JSON document placed at `extensions/<author>/<repo>.json` in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    pub name: String,
    pub short_description: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source_url: String,
    pub source_repo: String,
    pub source_commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_account: Option<String>,
}

pub fn source_url(github_username: &str, repo_name: &str) -> String {
    format!("https://github.com/{github_username}/{repo_name}")
}

impl ExtensionMetadata {
    /// Pretty-printed, newline-terminated
    pub fn render(&self) -> Result<String, MetadataError> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

/// String value of `key` in an existing metadata document
pub fn read_field(raw: &str, key: &str) -> Result<Option<String>, MetadataError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value.as_object().ok_or(MetadataError::NotAnObject)?;
    Ok(object.get(key).and_then(Value::as_str).map(str::to_string))
}

/// Rewrite only `source_commit`, keeping every other key and the key order.
pub fn rewrite_source_commit(raw: &str, commit: &str) -> Result<String, MetadataError> {
    let mut value: Value = serde_json::from_str(raw)?;
    let object = value.as_object_mut().ok_or(MetadataError::NotAnObject)?;
    object.insert("source_commit".to_string(), Value::String(commit.to_string()));

    let mut rendered = serde_json::to_string_pretty(&value)?;
    rendered.push('\n');
    Ok(rendered)
}
