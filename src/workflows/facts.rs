//! Named string facts accumulated by a publishing run

use super::error::StageError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Well-known fact names
pub mod keys {
    pub const GITHUB_USERNAME: &str = "github_username";
    pub const REPO_NAME: &str = "repo_name";
    pub const EXTENSION_NAME: &str = "extension_name";
    pub const DESCRIPTION: &str = "description";
    pub const AUTHOR: &str = "author";
    pub const TAGS: &str = "tags";
    pub const STRIPE_ACCOUNT: &str = "stripe_account";
    pub const EXTENSION_SOURCE_PATH: &str = "extension_source_path";
    pub const EXTENSION_JS_CODE: &str = "extension_js_code";
    pub const DEPOT_FOLDER: &str = "depot_folder";

    pub const LOCAL_REPO_PATH: &str = "local_repo_path";
    pub const INITIAL_COMMIT: &str = "initial_commit";
    pub const REPO_URL: &str = "repo_url";
    pub const FORK_REPO: &str = "fork_repo";
    pub const FORK_URL: &str = "fork_url";
    pub const DEPOT_PATH: &str = "depot_path";
    pub const FORK_BRANCH: &str = "fork_branch";
    pub const METADATA_PATH: &str = "metadata_path";
    pub const SOURCE_COMMIT: &str = "source_commit";
    pub const METADATA_COMMIT: &str = "metadata_commit";
    pub const PR_NUMBER: &str = "pr_number";
    pub const PR_URL: &str = "pr_url";
    pub const PR_SOURCE_BRANCH: &str = "pr_source_branch";
    pub const PR_TARGET_BRANCH: &str = "pr_target_branch";
}

static REPO_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("repo name pattern is valid"));

/// Mapping from fact name to value. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowFacts(BTreeMap<String, String>);

impl WorkflowFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Value of a fact a stage cannot run without.
    pub fn require(&self, key: &str) -> Result<&str, StageError> {
        self.get(key).ok_or_else(|| StageError::Precondition {
            message: format!("required fact '{key}' is missing"),
        })
    }

    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|key| !self.contains(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge a stage's output. Stage-produced values replace older ones.
    pub fn merge_delta(&mut self, delta: WorkflowFacts) {
        self.0.extend(delta.0);
    }

    /// Merge user-supplied values without touching anything already recorded.
    ///
    /// Returns the keys whose supplied value diverged from the recorded one and
    /// was therefore ignored.
    pub fn fill_missing(&mut self, supplied: &WorkflowFacts) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in &supplied.0 {
            match self.0.get(key) {
                None => {
                    self.0.insert(key.clone(), value.clone());
                }
                Some(existing) if existing != value => ignored.push(key.clone()),
                Some(_) => {}
            }
        }
        ignored
    }
}

/// Repository names become directory names, remote names and URL segments.
pub fn validate_repo_name(name: &str) -> Result<(), StageError> {
    if name == "." || name == ".." || !REPO_NAME_PATTERN.is_match(name) {
        return Err(StageError::UserInput {
            message: format!(
                "'{name}' is not a valid repository name (letters, digits, '.', '-', '_' only)"
            ),
        });
    }
    Ok(())
}

/// Split a comma-separated tag list, dropping empty entries.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
