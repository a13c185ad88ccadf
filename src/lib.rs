//! dependabot-bouncer: bulk triage of dependency update pull requests.
//!
//! Lists the open PRs an update bot has raised, works out which package
//! each one bumps, checks it against deny lists for packages and
//! organizations, and then approves, recreates, reports on or closes them
//! one repository at a time.

pub mod bouncer;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod forge;
pub mod github;
pub mod policy;
pub mod stale;
pub mod title;
pub mod types;

pub use bouncer::{CloseReport, RepoReport, close_stale, process_repository};
pub use classify::{ClassifiedPr, DEFAULT_BOT_LOGIN, actionable, classify, is_bot_author};
pub use cli::{Command, DisplayMode, Invocation, parse_args};
pub use config::{
    ConfigError, FileConfig, Overrides, PolicyConfig, ResolvedConfig, bot_login,
};
pub use dispatch::{ActionOutcome, BatchSummary, Mode, Task, execute_tasks, plan_tasks};
pub use forge::{DryRun, Forge};
pub use github::{GitHub, resolve_token};
pub use policy::{DenyListConfig, DenyReason, DenyRule, is_denied};
pub use stale::{describe_duration, format_age, parse_older_than, select_stale};
pub use title::{TitleStyle, extract_organization, parse_title};
pub use types::{
    Action, CheckConclusion, CheckInfo, CheckRunStatus, CheckState, CiState, MergeState,
    PackageIdentity, PullRequest, Repo, RepoError, ReviewDecision,
};
