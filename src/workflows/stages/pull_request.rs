//! Stage opening the registry pull request

use crate::external::PrConfig;
use crate::metadata::source_url;
use crate::workflows::error::StageError;
use crate::workflows::facts::{keys, WorkflowFacts};
use crate::workflows::stage::{Stage, StageContext};
use async_trait::async_trait;
use tracing::{info, warn};

/// Opens the registry pull request, or adopts the one an earlier run opened.
pub struct OpenPullRequest;

#[async_trait]
impl Stage for OpenPullRequest {
    fn name(&self) -> &'static str {
        "open-pull-request"
    }

    fn required_facts(&self) -> &'static [&'static str] {
        &[keys::GITHUB_USERNAME, keys::REPO_NAME, keys::EXTENSION_NAME, keys::FORK_BRANCH]
    }

    async fn run(&self, ctx: &StageContext, facts: &WorkflowFacts) -> Result<WorkflowFacts, StageError> {
        let registry = &ctx.config.registry.repo;
        let user = facts.require(keys::GITHUB_USERNAME)?;
        let branch = facts.require(keys::FORK_BRANCH)?;

        let recorded = match facts.get(keys::PR_NUMBER).and_then(|n| n.parse().ok()) {
            Some(number) => ctx.github.view_pull_request(registry, number).await?,
            None => None,
        };
        // A closed or merged pull request no longer carries the submission
        let recorded = recorded.filter(|pr| {
            let open = pr.state.eq_ignore_ascii_case("OPEN");
            if !open {
                warn!(number = pr.number, state = %pr.state, "Recorded pull request is no longer open");
            }
            open
        });

        let pr = match recorded {
            Some(pr) => Some(pr),
            None => ctx.github.find_open_pull_request(registry, user, branch).await?,
        };

        let pr = match pr {
            Some(pr) => {
                info!(number = pr.number, "Pull request already open");
                pr
            }
            None => {
                let name = facts.require(keys::EXTENSION_NAME)?;
                let url = source_url(user, facts.require(keys::REPO_NAME)?);
                let config = PrConfig {
                    title: format!("Add {name} extension"),
                    body: format!("This PR adds a new extension [{name}]({url})."),
                    head: format!("{user}:{branch}"),
                    base_branch: ctx.config.registry.base_branch.clone(),
                };
                ctx.github.create_pull_request(registry, &config).await?
            }
        };

        Ok(WorkflowFacts::new()
            .with(keys::PR_NUMBER, pr.number.to_string())
            .with(keys::PR_URL, pr.url)
            .with(keys::PR_SOURCE_BRANCH, pr.head_branch)
            .with(keys::PR_TARGET_BRANCH, pr.base_branch))
    }
}
