use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors produced when a repository identifier cannot be understood.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("repository must be in format 'owner/repo', got: '{0}'")]
    InvalidFormat(String),

    #[error("repository owner must not be empty")]
    EmptyOwner,

    #[error("repository name must not be empty")]
    EmptyName,

    #[error("URL must be a GitHub URL, got: '{0}'")]
    NotGitHub(String),

    #[error("failed to parse URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into().trim().to_string();
        let name = name.into().trim().to_string();

        if owner.is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.is_empty() {
            return Err(RepoError::EmptyName);
        }

        Ok(Self { owner, name })
    }

    /// Parses `owner/repo`.
    pub fn parse(value: &str) -> Result<Self, RepoError> {
        let value = value.trim();
        match value.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] => Self::new(*owner, *name),
            _ => Err(RepoError::InvalidFormat(value.to_string())),
        }
    }

    /// Parses a GitHub URL into its repository and, when the path is a pull
    /// request (`/owner/repo/pull/N`), the PR number.
    pub fn parse_url(value: &str) -> Result<(Self, Option<u64>), RepoError> {
        let url = url::Url::parse(value).map_err(|e| RepoError::InvalidUrl {
            url: value.to_string(),
            reason: e.to_string(),
        })?;

        if url.host_str() != Some("github.com") {
            return Err(RepoError::NotGitHub(value.to_string()));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, name] => Ok((Self::new(*owner, *name)?, None)),
            [owner, name, "pull", number, ..] => {
                let number = number.parse::<u64>().map_err(|_| RepoError::InvalidUrl {
                    url: value.to_string(),
                    reason: format!("invalid PR number '{number}'"),
                })?;
                Ok((Self::new(*owner, *name)?, Some(number)))
            }
            [owner, name, ..] => Ok((Self::new(*owner, *name)?, None)),
            _ => Err(RepoError::InvalidFormat(value.to_string())),
        }
    }

    /// Accepts either `owner/repo` or a GitHub URL pointing into the
    /// repository.
    pub fn parse_any(value: &str) -> Result<Self, RepoError> {
        if value.trim().starts_with("https://") {
            Self::parse_url(value.trim()).map(|(repo, _)| repo)
        } else {
            Self::parse(value)
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compares `owner/name`, ignoring case.
    pub fn same_as(&self, other: &Repo) -> bool {
        eq_ignore_case(&self.to_string(), &other.to_string())
    }
}

/// Unicode-aware case-insensitive string equality.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Mergeability of a pull request relative to its base branch, as reported
/// by GitHub's `mergeStateStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeState {
    Clean,
    Behind,
    Dirty,
    Blocked,
    Unstable,
    Draft,
    HasHooks,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MergeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeState::Clean => "CLEAN",
            MergeState::Behind => "BEHIND",
            MergeState::Dirty => "DIRTY",
            MergeState::Blocked => "BLOCKED",
            MergeState::Unstable => "UNSTABLE",
            MergeState::Draft => "DRAFT",
            MergeState::HasHooks => "HAS_HOOKS",
            MergeState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate review state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
    #[serde(other)]
    Unknown,
}

/// Lifecycle status of a GitHub check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Final outcome of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckConclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    ActionRequired,
    Neutral,
    Skipped,
    StartupFailure,
    Stale,
    #[serde(other)]
    Unknown,
}

impl CheckConclusion {
    /// Success, skipped and neutral outcomes do not block a merge.
    pub fn is_passing(&self) -> bool {
        matches!(
            self,
            CheckConclusion::Success | CheckConclusion::Skipped | CheckConclusion::Neutral
        )
    }
}

/// State of a legacy commit status context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Success,
    Failure,
    Error,
    Pending,
    Expected,
    #[serde(other)]
    Unknown,
}

/// A single CI check run or status context attached to a pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInfo {
    pub name: String,
    pub run_status: Option<CheckRunStatus>,
    pub conclusion: Option<CheckConclusion>,
    pub status_state: Option<CheckState>,
}

impl CheckInfo {
    /// A check run that has finished with the given conclusion.
    pub fn completed(name: impl Into<String>, conclusion: CheckConclusion) -> Self {
        Self {
            name: name.into(),
            run_status: Some(CheckRunStatus::Completed),
            conclusion: Some(conclusion),
            status_state: None,
        }
    }

    /// A check run that has not finished yet.
    pub fn running(name: impl Into<String>, status: CheckRunStatus) -> Self {
        Self {
            name: name.into(),
            run_status: Some(status),
            conclusion: None,
            status_state: None,
        }
    }

    /// A commit status context.
    pub fn status(name: impl Into<String>, state: CheckState) -> Self {
        Self {
            name: name.into(),
            run_status: None,
            conclusion: None,
            status_state: Some(state),
        }
    }

    /// Returns the outcome once the check has finished, `None` while it is
    /// still running.
    fn outcome(&self) -> Option<bool> {
        if let Some(state) = self.status_state {
            return match state {
                CheckState::Success => Some(true),
                CheckState::Failure | CheckState::Error => Some(false),
                CheckState::Pending | CheckState::Expected | CheckState::Unknown => None,
            };
        }

        match (self.run_status, self.conclusion) {
            (Some(CheckRunStatus::Completed) | None, Some(conclusion)) => {
                Some(conclusion.is_passing())
            }
            _ => None,
        }
    }
}

/// CI summary over all checks of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiState {
    Success,
    Failure,
    Pending,
}

impl CiState {
    /// Reduces check entries to a single state: pending when there are no
    /// entries or any entry is still running, failure when any finished
    /// entry failed, success otherwise.
    pub fn from_checks(checks: &[CheckInfo]) -> Self {
        if checks.is_empty() {
            return CiState::Pending;
        }

        let outcomes: Vec<Option<bool>> = checks.iter().map(CheckInfo::outcome).collect();

        if outcomes.iter().any(Option::is_none) {
            CiState::Pending
        } else if outcomes.contains(&Some(false)) {
            CiState::Failure
        } else {
            CiState::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CiState::Success => "success",
            CiState::Failure => "failure",
            CiState::Pending => "pending",
        }
    }
}

impl fmt::Display for CiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open pull request as listed by the forge.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub repo: Repo,
    pub number: u64,
    pub node_id: String,
    pub title: String,
    pub url: String,
    pub author_login: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub merge_state: MergeState,
    pub review_decision: Option<ReviewDecision>,
    pub checks: Vec<CheckInfo>,
}

impl PullRequest {
    pub fn ci_state(&self) -> CiState {
        CiState::from_checks(&self.checks)
    }

    pub fn is_approved(&self) -> bool {
        self.review_decision == Some(ReviewDecision::Approved)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| eq_ignore_case(l, label))
    }
}

/// Package and owning organization extracted from an update PR title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIdentity {
    pub package_name: String,
    pub organization_name: String,
}

impl PackageIdentity {
    pub fn new(package_name: impl Into<String>, organization_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            organization_name: organization_name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_name.is_empty()
    }
}

/// A mutating request sent to the forge for one pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    RequestRebase,
    RequestRecreate,
    EnableAutoMerge,
    Close,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::RequestRebase => "rebase",
            Action::RequestRecreate => "recreate",
            Action::EnableAutoMerge => "auto-merge",
            Action::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
