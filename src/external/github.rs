//! GitHub CLI abstractions
//!
//! Provides trait-based abstractions for the hosting-service operations the
//! publishing stages need, driven through the `gh` CLI.

use super::command::{CommandError, CommandExecutor};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub type PrId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    pub name: String,
    pub description: String,
    pub visibility: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrConfig {
    pub title: String,
    pub body: String,
    /// `<owner>:<branch>` for cross-repository pull requests
    pub head: String,
    pub base_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub name_with_owner: String,
    pub url: String,
    pub description: String,
    pub is_fork: bool,
    /// `<owner>/<name>` of the upstream when this repo is a fork
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub number: PrId,
    pub url: String,
    pub head_branch: String,
    pub base_branch: String,
    pub state: String,
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub authentication failed; run `gh auth login`")]
    AuthenticationFailed,
    #[error("Repository or resource not found: {message}")]
    NotFound { message: String },
    #[error("Repository already exists: {name}")]
    AlreadyExists { name: String },
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },
    #[error("Network error: {message}")]
    NetworkError { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("Invalid response from GitHub CLI: {message}")]
    InvalidResponse { message: String },
    #[error("GitHub CLI command failed: {message}")]
    CommandFailed { message: String },
}

/// Trait for GitHub operations
///
/// This abstraction enables testing GitHub integrations without actual
/// GitHub API calls, while preserving the exact interface used by the
/// application code.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GitHubOperations: Send + Sync {
    /// Login of the authenticated user
    async fn authenticated_user(&self) -> Result<String, GitHubError>;

    /// Look up a repository by `<owner>/<name>`, `None` when it does not exist
    async fn view_repo(&self, full_name: &str) -> Result<Option<RepoInfo>, GitHubError>;

    /// Create a repository owned by the authenticated user, returning its URL
    async fn create_repo(&self, config: &RepoConfig) -> Result<String, GitHubError>;

    /// Fork `upstream` into the authenticated user's account without cloning
    async fn fork_repo(&self, upstream: &str) -> Result<(), GitHubError>;

    /// Find an open pull request against `repo` whose head is `<head_owner>:<head_branch>`
    async fn find_open_pull_request(
        &self,
        repo: &str,
        head_owner: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequestInfo>, GitHubError>;

    /// Look up a pull request by number
    async fn view_pull_request(&self, repo: &str, number: PrId) -> Result<Option<PullRequestInfo>, GitHubError>;

    /// Open a pull request against `repo`
    async fn create_pull_request(&self, repo: &str, config: &PrConfig) -> Result<PullRequestInfo, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ParentRepo {
    name: String,
    owner: Owner,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoViewResponse {
    name_with_owner: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_fork: bool,
    #[serde(default)]
    parent: Option<ParentRepo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestResponse {
    number: PrId,
    url: String,
    head_ref_name: String,
    base_ref_name: String,
    state: String,
    #[serde(default)]
    head_repository_owner: Option<Owner>,
}

impl From<PullRequestResponse> for PullRequestInfo {
    fn from(pr: PullRequestResponse) -> Self {
        Self {
            number: pr.number,
            url: pr.url,
            head_branch: pr.head_ref_name,
            base_branch: pr.base_ref_name,
            state: pr.state,
        }
    }
}

const PR_FIELDS: &str = "number,url,headRefName,baseRefName,state,headRepositoryOwner";

/// Real GitHub CLI implementation
pub struct GitHubClient {
    executor: Arc<dyn CommandExecutor>,
}

impl GitHubClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn execute_gh_command(&self, args: &[&str]) -> Result<String, GitHubError> {
        let output = self.executor.execute("gh", args, None).await?;

        if !output.success() {
            return Err(classify_gh_error(&output.diagnostic()));
        }

        Ok(output.stdout)
    }

    /// Like `execute_gh_command`, mapping a not-found failure to `None`.
    async fn execute_lookup(&self, args: &[&str]) -> Result<Option<String>, GitHubError> {
        match self.execute_gh_command(args).await {
            Ok(stdout) => Ok(Some(stdout)),
            Err(GitHubError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn classify_gh_error(stderr: &str) -> GitHubError {
    let lower = stderr.to_lowercase();
    if lower.contains("gh auth login") || lower.contains("authentication") || lower.contains("not logged") {
        GitHubError::AuthenticationFailed
    } else if lower.contains("rate limit") {
        GitHubError::RateLimitExceeded {
            message: stderr.to_string(),
        }
    } else if lower.contains("could not resolve to a") || lower.contains("http 404") || lower.contains("not found") {
        GitHubError::NotFound {
            message: stderr.to_string(),
        }
    } else if lower.contains("name already exists") {
        GitHubError::AlreadyExists {
            name: stderr.to_string(),
        }
    } else if lower.contains("error connecting to")
        || lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("http 502")
        || lower.contains("http 503")
        || lower.contains("http 504")
    {
        GitHubError::NetworkError {
            message: stderr.to_string(),
        }
    } else {
        GitHubError::CommandFailed {
            message: stderr.to_string(),
        }
    }
}

pub fn parse_pr_number_from_url(url: &str) -> Result<PrId, GitHubError> {
    url.trim()
        .trim_end_matches('/')
        .split('/')
        .next_back()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GitHubError::InvalidResponse {
            message: format!("Could not parse pull request number from URL: {url}"),
        })
}

fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<T, GitHubError> {
    serde_json::from_str(raw).map_err(|e| GitHubError::InvalidResponse {
        message: format!("Failed to parse {what} JSON: {e}"),
    })
}

#[async_trait]
impl GitHubOperations for GitHubClient {
    async fn authenticated_user(&self) -> Result<String, GitHubError> {
        let output = self.execute_gh_command(&["api", "user", "-q", ".login"]).await?;
        let login = output.trim();
        if login.is_empty() {
            return Err(GitHubError::InvalidResponse {
                message: "empty login from `gh api user`".to_string(),
            });
        }
        Ok(login.to_string())
    }

    async fn view_repo(&self, full_name: &str) -> Result<Option<RepoInfo>, GitHubError> {
        let args = [
            "repo",
            "view",
            full_name,
            "--json",
            "nameWithOwner,url,description,isFork,parent",
        ];
        let Some(output) = self.execute_lookup(&args).await? else {
            return Ok(None);
        };

        let repo: RepoViewResponse = parse_json(&output, "repository")?;
        Ok(Some(RepoInfo {
            name_with_owner: repo.name_with_owner,
            url: repo.url,
            description: repo.description.unwrap_or_default(),
            is_fork: repo.is_fork,
            parent: repo.parent.map(|p| format!("{}/{}", p.owner.login, p.name)),
        }))
    }

    async fn create_repo(&self, config: &RepoConfig) -> Result<String, GitHubError> {
        let visibility = format!("--{}", config.visibility);
        let args = [
            "repo",
            "create",
            &config.name,
            &visibility,
            "--description",
            &config.description,
        ];

        let output = self.execute_gh_command(&args).await?;
        let url = output.lines().rev().find(|l| l.starts_with("https://")).unwrap_or("").trim();
        if url.is_empty() {
            return Err(GitHubError::InvalidResponse {
                message: format!("No repository URL in `gh repo create` output: {output}"),
            });
        }
        Ok(url.to_string())
    }

    async fn fork_repo(&self, upstream: &str) -> Result<(), GitHubError> {
        self.execute_gh_command(&["repo", "fork", upstream, "--remote=false", "--clone=false"])
            .await?;
        Ok(())
    }

    async fn find_open_pull_request(
        &self,
        repo: &str,
        head_owner: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequestInfo>, GitHubError> {
        let args = [
            "pr", "list", "--repo", repo, "--head", head_branch, "--state", "open", "--json", PR_FIELDS,
        ];
        let output = self.execute_gh_command(&args).await?;
        let prs: Vec<PullRequestResponse> = parse_json(&output, "pull request list")?;

        // --head matches the branch name only; forks of other users can share it
        Ok(prs
            .into_iter()
            .find(|pr| {
                pr.head_repository_owner
                    .as_ref()
                    .is_some_and(|owner| owner.login.eq_ignore_ascii_case(head_owner))
            })
            .map(PullRequestInfo::from))
    }

    async fn view_pull_request(&self, repo: &str, number: PrId) -> Result<Option<PullRequestInfo>, GitHubError> {
        let number = number.to_string();
        let args = ["pr", "view", &number, "--repo", repo, "--json", PR_FIELDS];
        let Some(output) = self.execute_lookup(&args).await? else {
            return Ok(None);
        };

        let pr: PullRequestResponse = parse_json(&output, "pull request")?;
        Ok(Some(pr.into()))
    }

    async fn create_pull_request(&self, repo: &str, config: &PrConfig) -> Result<PullRequestInfo, GitHubError> {
        let args = [
            "pr", "create",
            "--repo", repo,
            "--title", &config.title,
            "--body", &config.body,
            "--head", &config.head,
            "--base", &config.base_branch,
        ];

        let output = self.execute_gh_command(&args).await?;
        let url = output.trim().to_string();
        let number = parse_pr_number_from_url(&url)?;
        let head_branch = config
            .head
            .split_once(':')
            .map(|(_, branch)| branch)
            .unwrap_or(&config.head)
            .to_string();

        Ok(PullRequestInfo {
            number,
            url,
            head_branch,
            base_branch: config.base_branch.clone(),
            state: "OPEN".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::command::tests::MockCommandExecutor;
    use super::*;

    #[tokio::test]
    async fn test_authenticated_user() {
        let mock_executor =
            MockCommandExecutor::new().expect_output("gh", &["api", "user", "-q", ".login"], 0, "octocat\n", "");

        let client = GitHubClient::new(Arc::new(mock_executor));
        assert_eq!(client.authenticated_user().await.unwrap(), "octocat");
    }

    #[tokio::test]
    async fn test_authenticated_user_not_logged_in() {
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &["api", "user", "-q", ".login"],
            4,
            "",
            "To get started with GitHub CLI, please run:  gh auth login",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        let result = client.authenticated_user().await;

        assert!(matches!(result.unwrap_err(), GitHubError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_view_repo_parses_fork_parent() {
        let body = r#"{
            "nameWithOwner": "octocat/roam-depot",
            "url": "https://github.com/octocat/roam-depot",
            "description": "",
            "isFork": true,
            "parent": {"id": "R_1", "name": "roam-depot", "owner": {"id": "O_1", "login": "Roam-Research"}}
        }"#;
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &["repo", "view", "octocat/roam-depot", "--json", "nameWithOwner,url,description,isFork,parent"],
            0,
            body,
            "",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        let repo = client.view_repo("octocat/roam-depot").await.unwrap().unwrap();

        assert!(repo.is_fork);
        assert_eq!(repo.parent.as_deref(), Some("Roam-Research/roam-depot"));
    }

    #[tokio::test]
    async fn test_view_repo_missing_is_none() {
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &["repo", "view", "octocat/nope", "--json", "nameWithOwner,url,description,isFork,parent"],
            1,
            "",
            "GraphQL: Could not resolve to a Repository with the name 'octocat/nope'. (repository)",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        assert_eq!(client.view_repo("octocat/nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_pull_request_parses_number() {
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &[
                "pr", "create", "--repo", "Roam-Research/roam-depot", "--title", "Add X extension", "--body",
                "body", "--head", "octocat:add-x", "--base", "main",
            ],
            0,
            "https://github.com/Roam-Research/roam-depot/pull/123\n",
            "",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        let pr = client
            .create_pull_request(
                "Roam-Research/roam-depot",
                &PrConfig {
                    title: "Add X extension".to_string(),
                    body: "body".to_string(),
                    head: "octocat:add-x".to_string(),
                    base_branch: "main".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(pr.number, 123);
        assert_eq!(pr.head_branch, "add-x");
        assert_eq!(pr.base_branch, "main");
    }

    #[tokio::test]
    async fn test_find_open_pull_request_filters_by_owner() {
        let body = r#"[
            {"number": 7, "url": "u7", "headRefName": "add-x", "baseRefName": "main", "state": "OPEN",
             "headRepositoryOwner": {"id": "1", "login": "someone-else"}},
            {"number": 9, "url": "u9", "headRefName": "add-x", "baseRefName": "main", "state": "OPEN",
             "headRepositoryOwner": {"id": "2", "login": "octocat"}}
        ]"#;
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &["pr", "list", "--repo", "R/d", "--head", "add-x", "--state", "open", "--json", PR_FIELDS],
            0,
            body,
            "",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        let pr = client.find_open_pull_request("R/d", "octocat", "add-x").await.unwrap();

        assert_eq!(pr.map(|p| p.number), Some(9));
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let mock_executor = MockCommandExecutor::new().expect_output(
            "gh",
            &["repo", "fork", "R/d", "--remote=false", "--clone=false"],
            1,
            "",
            "HTTP 403: API rate limit exceeded for user",
        );

        let client = GitHubClient::new(Arc::new(mock_executor));
        let err = client.fork_repo("R/d").await.unwrap_err();

        assert!(matches!(err, GitHubError::RateLimitExceeded { .. }));
    }

    #[test]
    fn test_parse_pr_number_from_url() {
        assert_eq!(parse_pr_number_from_url("https://github.com/o/r/pull/42\n").unwrap(), 42);
        assert!(parse_pr_number_from_url("https://github.com/o/r/pull/").is_err());
    }
}
