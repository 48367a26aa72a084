//! Simulated git and GitHub over real temporary directories
//!
//! `FakeWorld` implements both external capability traits in memory. Files
//! are real (the stages write them through the standard file system); the
//! world tracks repositories, commits, remotes, hosted repos and pull
//! requests so tests can assert on the end state.

#![allow(dead_code)]

use async_trait::async_trait;
use roam_depot_publisher::cli::{SubmitArgs, UpdateArgs};
use roam_depot_publisher::external::{
    GitError, GitHubError, GitHubOperations, GitOperations, PrConfig, PullRequestInfo, RepoConfig, RepoInfo,
};
use roam_depot_publisher::{PublisherConfig, StageContext, StandardFileSystem, TerminalFactProvider};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const USER: &str = "ada";
pub const REGISTRY: &str = "Roam-Research/roam-depot";

type Tree = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
struct LocalRepo {
    head: String,
    branches: BTreeMap<String, String>,
    index: Tree,
    remotes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HostedRepo {
    pub info: RepoInfo,
    pub refs: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HostedPr {
    pub repo: String,
    pub head_owner: String,
    pub info: PullRequestInfo,
}

#[derive(Default)]
struct WorldState {
    repos: HashMap<PathBuf, LocalRepo>,
    commits: HashMap<String, Tree>,
    parents: HashMap<String, String>,
    hosted: BTreeMap<String, HostedRepo>,
    prs: Vec<HostedPr>,
    push_failures: HashMap<String, usize>,
    calls: Vec<String>,
}

pub struct FakeWorld {
    state: Mutex<WorldState>,
}

fn slug(url: &str) -> String {
    let trimmed = url.trim_end_matches(".git");
    trimmed
        .trim_start_matches("https://github.com/")
        .to_lowercase()
}

/// Whether `ancestor` is reachable from `commit` through first parents
fn is_ancestor(parents: &HashMap<String, String>, ancestor: &str, commit: &str) -> bool {
    let mut current = Some(commit);
    while let Some(c) = current {
        if c == ancestor {
            return true;
        }
        current = parents.get(c).map(String::as_str);
    }
    false
}

fn write_tree(dir: &Path, tree: &Tree) {
    for (path, contents) in tree {
        let file = dir.join(path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, contents).unwrap();
    }
}

fn snapshot(dir: &Path) -> Tree {
    fn walk(root: &Path, dir: &Path, tree: &mut Tree) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, tree);
            } else if let Ok(contents) = std::fs::read_to_string(&path) {
                let relative = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                tree.insert(relative, contents);
            }
        }
    }
    let mut tree = Tree::new();
    walk(dir, dir, &mut tree);
    tree
}

impl FakeWorld {
    /// A world where the registry exists with one commit on `main`
    pub fn new() -> Arc<Self> {
        let world = Self {
            state: Mutex::new(WorldState::default()),
        };
        {
            let mut state = world.state.lock().unwrap();
            let commit = format!("{:040x}", 1);
            state.commits.insert(
                commit.clone(),
                Tree::from([("README.md".to_string(), "# Roam Depot\n".to_string())]),
            );
            state.hosted.insert(
                REGISTRY.to_lowercase(),
                HostedRepo {
                    info: RepoInfo {
                        name_with_owner: REGISTRY.to_string(),
                        url: format!("https://github.com/{REGISTRY}"),
                        description: "Roam Research extension registry".to_string(),
                        is_fork: false,
                        parent: None,
                    },
                    refs: BTreeMap::from([("main".to_string(), commit)]),
                },
            );
        }
        Arc::new(world)
    }

    pub fn add_hosted_repo(&self, full_name: &str, description: &str, is_fork: bool, parent: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.hosted.insert(
            full_name.to_lowercase(),
            HostedRepo {
                info: RepoInfo {
                    name_with_owner: full_name.to_string(),
                    url: format!("https://github.com/{full_name}"),
                    description: description.to_string(),
                    is_fork,
                    parent: parent.map(str::to_string),
                },
                refs: BTreeMap::new(),
            },
        );
    }

    /// Commit a change to `path` directly on a hosted branch, as an edit made
    /// on GitHub would. Returns the new commit.
    pub fn commit_on_hosted(&self, full_name: &str, branch: &str, path: &str, contents: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let key = full_name.to_lowercase();
        let parent = state.hosted[&key].refs[branch].clone();
        let mut tree = state.commits[&parent].clone();
        tree.insert(path.to_string(), contents.to_string());

        let commit = format!("{:040x}", state.commits.len() + 1);
        state.commits.insert(commit.clone(), tree);
        state.parents.insert(commit.clone(), parent);
        state.hosted.get_mut(&key).unwrap().refs.insert(branch.to_string(), commit.clone());
        commit
    }

    /// Make the next `times` pushes of `branch` fail with a network error
    pub fn fail_push(&self, branch: &str, times: usize) {
        self.state.lock().unwrap().push_failures.insert(branch.to_string(), times);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn hosted(&self, full_name: &str) -> Option<HostedRepo> {
        self.state.lock().unwrap().hosted.get(&full_name.to_lowercase()).cloned()
    }

    pub fn pull_requests(&self) -> Vec<HostedPr> {
        self.state.lock().unwrap().prs.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits.len()
    }

    /// Commit a hosted ref points at
    pub fn hosted_ref(&self, full_name: &str, branch: &str) -> Option<String> {
        self.hosted(full_name).and_then(|r| r.refs.get(branch).cloned())
    }

    /// File contents of `path` in commit `commit`
    pub fn file_at(&self, commit: &str, path: &str) -> Option<String> {
        self.state.lock().unwrap().commits.get(commit).and_then(|t| t.get(path).cloned())
    }

    pub fn local_head(&self, dir: &Path) -> Option<String> {
        let state = self.state.lock().unwrap();
        let repo = state.repos.get(dir)?;
        repo.branches.get(&repo.head).cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn with_repo<T>(&self, dir: &Path, f: impl FnOnce(&mut LocalRepo, &mut HashMap<String, Tree>) -> T) -> Result<T, GitError> {
        let mut state = self.state.lock().unwrap();
        let WorldState { repos, commits, .. } = &mut *state;
        let repo = repos.get_mut(dir).ok_or_else(|| GitError::RepositoryNotFound {
            path: dir.display().to_string(),
        })?;
        Ok(f(repo, commits))
    }

    fn remote_repo(&self, dir: &Path, remote: &str) -> Result<String, GitError> {
        self.with_repo(dir, |repo, _| repo.remotes.get(remote).map(|url| slug(url)))?
            .ok_or_else(|| GitError::GitCommandFailed {
                message: format!("fatal: '{remote}' does not appear to be a git repository"),
            })
    }
}

#[async_trait]
impl GitOperations for FakeWorld {
    async fn is_repository(&self, dir: &Path) -> Result<bool, GitError> {
        Ok(self.state.lock().unwrap().repos.contains_key(dir))
    }

    async fn init(&self, dir: &Path) -> Result<(), GitError> {
        self.record(format!("git init {}", dir.display()));
        let mut state = self.state.lock().unwrap();
        state.repos.entry(dir.to_path_buf()).or_insert_with(|| LocalRepo {
            head: "main".to_string(),
            ..Default::default()
        });
        Ok(())
    }

    async fn current_branch(&self, dir: &Path) -> Result<Option<String>, GitError> {
        self.with_repo(dir, |repo, _| Some(repo.head.clone()))
    }

    async fn head_commit(&self, dir: &Path) -> Result<Option<String>, GitError> {
        self.with_repo(dir, |repo, _| repo.branches.get(&repo.head).cloned())
    }

    async fn branch_exists(&self, dir: &Path, branch: &str) -> Result<bool, GitError> {
        self.with_repo(dir, |repo, _| repo.branches.contains_key(branch))
    }

    async fn remote_branch_exists(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool, GitError> {
        let hosted = self.remote_repo(dir, remote)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .hosted
            .get(&hosted)
            .is_some_and(|r| r.refs.contains_key(branch)))
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.record(format!("git checkout {branch}"));
        let remote_commit = {
            let state = self.state.lock().unwrap();
            state
                .repos
                .get(dir)
                .and_then(|repo| repo.remotes.get("origin"))
                .and_then(|url| state.hosted.get(&slug(url)))
                .and_then(|hosted| hosted.refs.get(branch).cloned())
        };
        self.with_repo(dir, |repo, commits| {
            let commit = match repo.branches.get(branch) {
                Some(commit) => commit.clone(),
                None => {
                    let commit = remote_commit.ok_or_else(|| GitError::GitCommandFailed {
                        message: format!("error: pathspec '{branch}' did not match any file(s) known to git"),
                    })?;
                    repo.branches.insert(branch.to_string(), commit.clone());
                    commit
                }
            };
            repo.head = branch.to_string();
            repo.index = commits.get(&commit).cloned().unwrap_or_default();
            Ok(())
        })?
    }

    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.record(format!("git checkout -b {branch}"));
        self.with_repo(dir, |repo, _| {
            if let Some(commit) = repo.branches.get(&repo.head).cloned() {
                repo.branches.insert(branch.to_string(), commit);
            }
            repo.head = branch.to_string();
        })
    }

    async fn stage_all(&self, dir: &Path) -> Result<(), GitError> {
        let tree = snapshot(dir);
        self.with_repo(dir, |repo, _| repo.index = tree)
    }

    async fn stage_path(&self, dir: &Path, path: &str) -> Result<(), GitError> {
        let contents = std::fs::read_to_string(dir.join(path)).map_err(|e| GitError::GitCommandFailed {
            message: format!("fatal: pathspec '{path}' did not match any files: {e}"),
        })?;
        self.with_repo(dir, |repo, _| {
            repo.index.insert(path.to_string(), contents);
        })
    }

    async fn has_staged_changes(&self, dir: &Path) -> Result<bool, GitError> {
        self.with_repo(dir, |repo, commits| {
            let committed = repo
                .branches
                .get(&repo.head)
                .and_then(|c| commits.get(c))
                .cloned()
                .unwrap_or_default();
            committed != repo.index
        })
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<String, GitError> {
        self.record(format!("git commit -m {message}"));
        let mut state = self.state.lock().unwrap();
        let WorldState { repos, commits, parents, .. } = &mut *state;
        let repo = repos.get_mut(dir).ok_or_else(|| GitError::RepositoryNotFound {
            path: dir.display().to_string(),
        })?;

        let commit = format!("{:040x}", commits.len() + 1);
        commits.insert(commit.clone(), repo.index.clone());
        if let Some(parent) = repo.branches.get(&repo.head) {
            parents.insert(commit.clone(), parent.clone());
        }
        repo.branches.insert(repo.head.clone(), commit.clone());
        Ok(commit)
    }

    async fn remote_url(&self, dir: &Path, remote: &str) -> Result<Option<String>, GitError> {
        self.with_repo(dir, |repo, _| repo.remotes.get(remote).cloned())
    }

    async fn add_remote(&self, dir: &Path, remote: &str, url: &str) -> Result<(), GitError> {
        self.record(format!("git remote add {remote} {url}"));
        self.with_repo(dir, |repo, _| {
            repo.remotes.insert(remote.to_string(), url.to_string());
        })
    }

    async fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("git push {remote} {branch}"));
        {
            let mut state = self.state.lock().unwrap();
            if let Some(remaining) = state.push_failures.get_mut(branch) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(GitError::Network {
                        message: "fatal: unable to access: Could not resolve host: github.com".to_string(),
                    });
                }
            }
        }

        let hosted = self.remote_repo(dir, remote)?;
        let commit = self
            .with_repo(dir, |repo, _| repo.branches.get(branch).cloned())?
            .ok_or_else(|| GitError::GitCommandFailed {
                message: format!("error: src refspec {branch} does not match any"),
            })?;

        let mut state = self.state.lock().unwrap();
        let WorldState { hosted: repos, parents, .. } = &mut *state;
        let target = repos.get_mut(&hosted).ok_or_else(|| GitError::GitCommandFailed {
            message: format!("remote: Repository not found: {hosted}"),
        })?;
        if let Some(current) = target.refs.get(branch) {
            if !is_ancestor(parents, current, &commit) {
                return Err(GitError::PushRejected {
                    remote: remote.to_string(),
                    branch: branch.to_string(),
                    message: format!(" ! [rejected]        {branch} -> {branch} (fetch first)"),
                });
            }
        }
        target.refs.insert(branch.to_string(), commit);
        Ok(())
    }

    async fn fetch(&self, dir: &Path, remote: &str) -> Result<(), GitError> {
        self.record(format!("git fetch {remote}"));
        self.remote_repo(dir, remote).map(|_| ())
    }

    async fn fast_forward(&self, dir: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("git merge --ff-only {remote}/{branch}"));
        let hosted = self.remote_repo(dir, remote)?;

        let mut state = self.state.lock().unwrap();
        let WorldState { repos, commits, parents, hosted: hosted_repos, .. } = &mut *state;
        let Some(upstream) = hosted_repos.get(&hosted).and_then(|r| r.refs.get(branch)).cloned() else {
            return Ok(());
        };
        let repo = repos.get_mut(dir).ok_or_else(|| GitError::RepositoryNotFound {
            path: dir.display().to_string(),
        })?;
        let local = repo.branches.get(branch).cloned().unwrap_or_default();

        if is_ancestor(parents, &upstream, &local) {
            return Ok(());
        }
        if !is_ancestor(parents, &local, &upstream) {
            return Err(GitError::Diverged {
                reference: format!("{remote}/{branch}"),
                message: "fatal: Not possible to fast-forward, aborting.".to_string(),
            });
        }

        let tree = commits.get(&upstream).cloned().unwrap_or_default();
        repo.branches.insert(branch.to_string(), upstream);
        if repo.head == branch {
            write_tree(dir, &tree);
            repo.index = tree;
        }
        Ok(())
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.record(format!("git clone {url}"));
        let mut state = self.state.lock().unwrap();
        let hosted = state.hosted.get(&slug(url)).cloned().ok_or_else(|| GitError::GitCommandFailed {
            message: format!("remote: Repository not found: {url}"),
        })?;

        let head = "main".to_string();
        let commit = hosted.refs.get(&head).cloned().unwrap_or_default();
        let tree = state.commits.get(&commit).cloned().unwrap_or_default();

        std::fs::create_dir_all(dest).unwrap();
        write_tree(dest, &tree);

        state.repos.insert(
            dest.to_path_buf(),
            LocalRepo {
                head: head.clone(),
                branches: BTreeMap::from([(head, commit)]),
                index: tree,
                remotes: BTreeMap::from([("origin".to_string(), url.to_string())]),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl GitHubOperations for FakeWorld {
    async fn authenticated_user(&self) -> Result<String, GitHubError> {
        self.record("gh api user".to_string());
        Ok(USER.to_string())
    }

    async fn view_repo(&self, full_name: &str) -> Result<Option<RepoInfo>, GitHubError> {
        self.record(format!("gh repo view {full_name}"));
        Ok(self.hosted(full_name).map(|r| r.info))
    }

    async fn create_repo(&self, config: &RepoConfig) -> Result<String, GitHubError> {
        self.record(format!("gh repo create {}", config.name));
        let full_name = format!("{USER}/{}", config.name);
        if self.hosted(&full_name).is_some() {
            return Err(GitHubError::AlreadyExists { name: full_name });
        }
        self.add_hosted_repo(&full_name, &config.description, false, None);
        Ok(format!("https://github.com/{full_name}"))
    }

    async fn fork_repo(&self, upstream: &str) -> Result<(), GitHubError> {
        self.record(format!("gh repo fork {upstream}"));
        let upstream_repo = self.hosted(upstream).ok_or_else(|| GitHubError::NotFound {
            message: upstream.to_string(),
        })?;
        let fork_name = format!("{USER}/roam-depot");
        self.add_hosted_repo(&fork_name, &upstream_repo.info.description, true, Some(REGISTRY));
        self.state
            .lock()
            .unwrap()
            .hosted
            .get_mut(&fork_name)
            .unwrap()
            .refs = upstream_repo.refs;
        Ok(())
    }

    async fn find_open_pull_request(
        &self,
        repo: &str,
        head_owner: &str,
        head_branch: &str,
    ) -> Result<Option<PullRequestInfo>, GitHubError> {
        self.record(format!("gh pr list {repo} {head_owner}:{head_branch}"));
        Ok(self
            .pull_requests()
            .into_iter()
            .find(|pr| {
                pr.repo == repo
                    && pr.head_owner == head_owner
                    && pr.info.head_branch == head_branch
                    && pr.info.state == "OPEN"
            })
            .map(|pr| pr.info))
    }

    async fn view_pull_request(&self, repo: &str, number: u64) -> Result<Option<PullRequestInfo>, GitHubError> {
        self.record(format!("gh pr view {number}"));
        Ok(self
            .pull_requests()
            .into_iter()
            .find(|pr| pr.repo == repo && pr.info.number == number)
            .map(|pr| pr.info))
    }

    async fn create_pull_request(&self, repo: &str, config: &PrConfig) -> Result<PullRequestInfo, GitHubError> {
        self.record(format!("gh pr create {repo} {}", config.head));
        let (owner, branch) = config.head.split_once(':').unwrap();
        let mut state = self.state.lock().unwrap();
        let number = state.prs.len() as u64 + 1;
        let info = PullRequestInfo {
            number,
            url: format!("https://github.com/{repo}/pull/{number}"),
            head_branch: branch.to_string(),
            base_branch: config.base_branch.clone(),
            state: "OPEN".to_string(),
        };
        state.prs.push(HostedPr {
            repo: repo.to_string(),
            head_owner: owner.to_string(),
            info: info.clone(),
        });
        Ok(info)
    }
}

/// A workspace directory plus the world the stages act on
pub struct TestEnv {
    pub workspace: TempDir,
    pub world: Arc<FakeWorld>,
    pub ctx: StageContext,
}

impl TestEnv {
    pub fn new() -> Self {
        let workspace = TempDir::new().unwrap();
        let world = FakeWorld::new();
        let ctx = StageContext::new(
            world.clone(),
            world.clone(),
            Arc::new(StandardFileSystem),
            Arc::new(PublisherConfig::default()),
            workspace.path().to_path_buf(),
        );
        Self { workspace, world, ctx }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.workspace.path().join(relative)
    }

    pub fn checkpoint(&self, repo: &str, mode: &str) -> Option<serde_json::Value> {
        let file = self.path(&format!(".roam-depot-publisher/{repo}/{mode}.json"));
        let raw = std::fs::read_to_string(file).ok()?;
        Some(serde_json::from_str(&raw).unwrap())
    }
}

/// Provider that never prompts; every required fact must come from flags
pub fn no_prompt() -> TerminalFactProvider<Cursor<&'static str>, Vec<u8>> {
    TerminalFactProvider::new(Cursor::new(""), Vec::new(), false)
}

pub fn submit_args(repo: &str) -> SubmitArgs {
    SubmitArgs {
        extension_repo_name: Some(repo.to_string()),
        extension_name: Some("X".to_string()),
        extension_short_description: Some("d".to_string()),
        extension_author: Some("A".to_string()),
        ..Default::default()
    }
}

pub fn update_args(repo: &str) -> UpdateArgs {
    UpdateArgs {
        extension_repo_name: Some(repo.to_string()),
        ..Default::default()
    }
}
