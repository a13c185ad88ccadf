//! Per-repository orchestration: list, classify, plan and execute.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{
    classify::{ClassifiedPr, classify},
    config::ResolvedConfig,
    dispatch::{BatchSummary, Mode, Task, execute_tasks, plan_tasks},
    forge::Forge,
    stale::{describe_duration, select_stale},
    types::{Action, PullRequest, Repo},
};

/// What happened in one repository during an approve, recreate or check
/// run.
#[derive(Debug)]
pub struct RepoReport {
    pub repo: Repo,
    pub prs: Vec<ClassifiedPr>,
    pub summary: BatchSummary,
}

impl RepoReport {
    pub fn skipped(&self) -> usize {
        self.prs.iter().filter(|pr| pr.is_skipped()).count()
    }
}

pub async fn process_repository<F>(
    forge: &F,
    config: &ResolvedConfig,
    mode: Mode,
) -> Result<RepoReport>
where
    F: Forge + Sync + ?Sized,
{
    debug!(
        "Processing {} ({:?}, bot {}, {} package rules, {} org rules)",
        config.repo,
        mode,
        config.bot,
        config.policy.denied_packages.len(),
        config.policy.denied_orgs.len()
    );

    let prs = forge
        .list_open_pull_requests(&config.repo, Some(&config.bot))
        .await
        .with_context(|| format!("Failed to list pull requests for {}", config.repo))?;
    info!("Found {} open PRs in {}", prs.len(), config.repo);

    let prs = classify(prs, &config.policy, &config.bot, mode.skips_failing());
    let tasks = plan_tasks(&prs, mode);
    let summary = execute_tasks(forge, tasks).await;

    Ok(RepoReport {
        repo: config.repo.clone(),
        prs,
        summary,
    })
}

/// Stale pull requests found in one repository and what closing them did.
#[derive(Debug)]
pub struct CloseReport {
    pub repo: Repo,
    pub label: String,
    pub older_than: Duration,
    pub stale: Vec<PullRequest>,
    pub summary: BatchSummary,
}

/// Closes open PRs with `label` older than `older_than`, whoever opened
/// them.
pub async fn close_stale<F>(
    forge: &F,
    repo: &Repo,
    label: &str,
    older_than: Duration,
    now: DateTime<Utc>,
) -> Result<CloseReport>
where
    F: Forge + Sync + ?Sized,
{
    let prs = forge
        .list_open_pull_requests(repo, None)
        .await
        .with_context(|| format!("Failed to list pull requests for {}", repo))?;

    let stale = select_stale(prs, label, older_than, now);
    info!(
        "Found {} PRs in {} labelled '{}' older than {}",
        stale.len(),
        repo,
        label,
        describe_duration(older_than)
    );

    let tasks = stale
        .iter()
        .map(|pr| Task {
            pr: pr.clone(),
            action: Action::Close,
        })
        .collect();
    let summary = execute_tasks(forge, tasks).await;

    Ok(CloseReport {
        repo: repo.clone(),
        label: label.to_string(),
        older_than,
        stale,
        summary,
    })
}
