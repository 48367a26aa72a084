//! Stages acting on the extension's own repository

use super::{commit_if_staged, require_head, same_repo, switch_to_branch};
use crate::external::RepoConfig;
use crate::workflows::error::StageError;
use crate::workflows::facts::{keys, WorkflowFacts};
use crate::workflows::stage::{Stage, StageContext};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const DEFAULT_EXTENSION_JS: &str = r#"export default {
  onload: () => { console.log("Extension loaded!"); },
  onunload: () => { console.log("Extension unloaded!"); }
};
"#;

fn readme(extension_name: &str, description: &str) -> String {
    format!(
        "# {extension_name}\n\n{description}\n\n\
         ## Installation\n\n\
         1. Go to Roam Marketplace\n\
         2. Search for \"{extension_name}\"\n\
         3. Install\n\n\
         ## Usage\n\n```javascript\n// This extension adds ...\n```\n"
    )
}

/// Description the remote repository is created with; doubles as its ownership marker
pub fn repo_description(description: &str, author: &str) -> String {
    format!("{description} (by {author})")
}

pub struct InitLocalRepo;

impl InitLocalRepo {
    async fn extension_source(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<String, StageError> {
        if let Some(source) = facts.get(keys::EXTENSION_SOURCE_PATH).filter(|p| !p.is_empty()) {
            return ctx.fs.read_to_string(Path::new(source)).await.map_err(|e| {
                StageError::user_input(format!("cannot read extension file '{source}': {e}"))
            });
        }

        match facts.get(keys::EXTENSION_JS_CODE).map(str::trim) {
            Some(code) if !code.is_empty() => Ok(format!("{code}\n")),
            _ => Ok(DEFAULT_EXTENSION_JS.to_string()),
        }
    }
}

#[async_trait]
impl Stage for InitLocalRepo {
    fn name(&self) -> &'static str {
        "init-local-repo"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::REPO_NAME, keys::EXTENSION_NAME, keys::DESCRIPTION]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.extension_dir(facts.require(keys::REPO_NAME)?);
        ctx.fs.create_dir_all(&dir).await?;

        let extension_js = dir.join("extension.js");
        if ctx.fs.exists(&extension_js) {
            info!(file = ?extension_js, "extension.js already present; leaving it untouched");
        } else {
            let source = self.extension_source(ctx, facts).await?;
            ctx.fs.write(&extension_js, source.as_bytes()).await?;
        }

        let readme_path = dir.join("README.md");
        if !ctx.fs.exists(&readme_path) {
            let contents = readme(facts.require(keys::EXTENSION_NAME)?, facts.require(keys::DESCRIPTION)?);
            ctx.fs.write(&readme_path, contents.as_bytes()).await?;
        }

        if ctx.git.is_repository(&dir).await? {
            info!(dir = ?dir, "Repository already initialized");
        } else {
            ctx.git.init(&dir).await?;
        }

        Ok(WorkflowFacts::new().with(keys::LOCAL_REPO_PATH, dir.display().to_string()))
    }
}

pub struct SetBranchMaster;

#[async_trait]
impl Stage for SetBranchMaster {
    fn name(&self) -> &'static str {
        "set-branch-master"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::LOCAL_REPO_PATH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.local_repo(facts)?;
        switch_to_branch(ctx, &dir, &ctx.config.extension.default_branch, None).await?;
        Ok(WorkflowFacts::new())
    }
}

pub struct CommitInitial;

#[async_trait]
impl Stage for CommitInitial {
    fn name(&self) -> &'static str {
        "commit-initial"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::LOCAL_REPO_PATH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.local_repo(facts)?;
        ctx.git.stage_all(&dir).await?;

        let head = match commit_if_staged(ctx, &dir, "Initial commit of extension files").await? {
            Some(commit) => commit,
            None => require_head(ctx, &dir).await?,
        };

        Ok(WorkflowFacts::new().with(keys::INITIAL_COMMIT, head))
    }
}

pub struct CreateRemoteRepo;

#[async_trait]
impl Stage for CreateRemoteRepo {
    fn name(&self) -> &'static str {
        "create-remote-repo"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[
            keys::GITHUB_USERNAME,
            keys::REPO_NAME,
            keys::DESCRIPTION,
            keys::AUTHOR,
            keys::LOCAL_REPO_PATH,
        ]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.local_repo(facts)?;
        let repo_name = facts.require(keys::REPO_NAME)?;
        let full_name = format!("{}/{}", facts.require(keys::GITHUB_USERNAME)?, repo_name);
        let description = repo_description(facts.require(keys::DESCRIPTION)?, facts.require(keys::AUTHOR)?);

        let url = match ctx.github.view_repo(&full_name).await? {
            Some(existing) => {
                let recorded = facts.get(keys::REPO_URL) == Some(existing.url.as_str());
                if !recorded && existing.description != description {
                    return Err(StageError::conflict(format!(
                        "repository {full_name} already exists and was not created by this tool \
                         (description '{}' differs from '{description}'); choose another repository name",
                        existing.description
                    )));
                }
                info!(repo = %full_name, "Remote repository already exists; reusing it");
                existing.url
            }
            None => {
                ctx.github
                    .create_repo(&RepoConfig {
                        name: repo_name.to_string(),
                        description,
                        visibility: ctx.config.extension.visibility.clone(),
                    })
                    .await?
            }
        };

        let remote = &ctx.config.extension.remote;
        match ctx.git.remote_url(&dir, remote).await? {
            None => {
                ctx.git.add_remote(&dir, remote, &format!("{url}.git")).await?;
            }
            Some(existing) if same_repo(&existing, &full_name) => {}
            Some(existing) => {
                return Err(StageError::conflict(format!(
                    "remote '{remote}' in {} points at {existing}, not {full_name}",
                    dir.display()
                )));
            }
        }

        Ok(WorkflowFacts::new().with(keys::REPO_URL, url))
    }
}

pub struct PushMaster;

#[async_trait]
impl Stage for PushMaster {
    fn name(&self) -> &'static str {
        "push-master"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::LOCAL_REPO_PATH, keys::REPO_URL]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.local_repo(facts)?;
        ctx.git
            .push(&dir, &ctx.config.extension.remote, &ctx.config.extension.default_branch)
            .await?;
        Ok(WorkflowFacts::new())
    }
}

pub struct CommitCodeChanges;

#[async_trait]
impl Stage for CommitCodeChanges {
    fn name(&self) -> &'static str {
        "commit-code-changes"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::LOCAL_REPO_PATH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let dir = ctx.local_repo(facts)?;
        switch_to_branch(ctx, &dir, &ctx.config.extension.default_branch, None).await?;
        ctx.git.stage_all(&dir).await?;

        if commit_if_staged(ctx, &dir, "Update extension code").await?.is_none() {
            info!("No new code changes found; skipping commit");
        }
        Ok(WorkflowFacts::new())
    }
}
