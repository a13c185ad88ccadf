use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::types::{Action, PullRequest, Repo};

/// Abstraction over the source-control provider hosting the pull requests.
///
/// Implementations own transport concerns such as authentication and
/// request timeouts. Every call is awaited to completion before the next
/// one is made.
#[async_trait]
pub trait Forge {
    /// Lists open pull requests, optionally restricted to one author.
    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        author: Option<&str>,
    ) -> Result<Vec<PullRequest>>;

    /// Applies a single action to a pull request.
    async fn apply_action(&self, pr: &PullRequest, action: Action) -> Result<()>;
}

/// Wraps a forge so that listing goes through but actions are only logged.
pub struct DryRun<F> {
    inner: F,
}

impl<F> DryRun<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F> Forge for DryRun<F>
where
    F: Forge + Send + Sync,
{
    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        author: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        self.inner.list_open_pull_requests(repo, author).await
    }

    async fn apply_action(&self, pr: &PullRequest, action: Action) -> Result<()> {
        info!(
            "[dry-run] would {} {}#{}: {}",
            action, pr.repo, pr.number, pr.title
        );
        Ok(())
    }
}
