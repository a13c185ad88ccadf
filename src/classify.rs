use tracing::{debug, info};

use crate::{
    policy::{DenyListConfig, DenyReason},
    title::parse_title,
    types::{CiState, PackageIdentity, PullRequest},
};

/// Login of the update bot whose pull requests are triaged.
pub const DEFAULT_BOT_LOGIN: &str = "dependabot";

/// A pull request annotated with its package identity, CI state and policy
/// verdict.
#[derive(Debug, Clone)]
pub struct ClassifiedPr {
    pub pr: PullRequest,
    pub identity: PackageIdentity,
    pub ci_state: CiState,
    pub deny_reason: Option<DenyReason>,
}

impl ClassifiedPr {
    pub fn is_skipped(&self) -> bool {
        self.deny_reason.is_some()
    }

    /// Human-readable skip reason, empty when the PR is not skipped.
    pub fn skip_reason(&self) -> String {
        self.deny_reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Tests whether an author login belongs to the bot. Bot accounts show up
/// as `name`, `name[bot]` or `app/name` depending on the API used.
pub fn is_bot_author(login: &str, bot: &str) -> bool {
    let login = login.to_lowercase();
    let bot = bot.to_lowercase();

    login == bot || login == format!("{bot}[bot]") || login == format!("app/{bot}")
}

/// Filters and annotates raw pull requests.
///
/// Ignored PRs and PRs from other authors are dropped. Denied PRs are kept
/// but marked skipped so a report can still show them. With
/// `skip_failing`, PRs whose CI has not succeeded are dropped as well.
/// Input order is preserved.
pub fn classify(
    prs: Vec<PullRequest>,
    policy: &DenyListConfig,
    bot: &str,
    skip_failing: bool,
) -> Vec<ClassifiedPr> {
    let mut classified = Vec::with_capacity(prs.len());

    for pr in prs {
        if policy.is_ignored(pr.number) {
            info!("Ignoring PR #{} (ignore list): {}", pr.number, pr.title);
            continue;
        }

        if !is_bot_author(&pr.author_login, bot) {
            debug!(
                "Skipping PR #{} by {} (not {})",
                pr.number, pr.author_login, bot
            );
            continue;
        }

        let identity = parse_title(&pr.title);
        let deny_reason = policy.evaluate(&identity);
        if let Some(reason) = &deny_reason {
            info!(
                "Skipping denied package: {} (org: {}) - PR #{}: {} [{}]",
                identity.package_name, identity.organization_name, pr.number, pr.title, reason
            );
        }

        let ci_state = pr.ci_state();
        if skip_failing && ci_state != CiState::Success {
            info!(
                "Skipping PR #{} with CI {}: {}",
                pr.number, ci_state, pr.title
            );
            continue;
        }

        classified.push(ClassifiedPr {
            pr,
            identity,
            ci_state,
            deny_reason,
        });
    }

    classified
}

/// The classified PRs that policy allows acting on.
pub fn actionable(prs: &[ClassifiedPr]) -> impl Iterator<Item = &ClassifiedPr> {
    prs.iter().filter(|pr| !pr.is_skipped())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{CheckConclusion, CheckInfo, CheckRunStatus, MergeState, Repo};

    fn pr(number: u64, title: &str, author: &str, checks: Vec<CheckInfo>) -> PullRequest {
        PullRequest {
            repo: Repo::new("owner", "repo").unwrap(),
            number,
            node_id: format!("PR_{number}"),
            title: title.to_string(),
            url: format!("https://github.com/owner/repo/pull/{number}"),
            author_login: author.to_string(),
            labels: vec!["dependencies".to_string()],
            created_at: Utc::now(),
            merge_state: MergeState::Clean,
            review_decision: None,
            checks,
        }
    }

    fn green() -> Vec<CheckInfo> {
        vec![CheckInfo::completed("ci/build", CheckConclusion::Success)]
    }

    fn numbers(prs: &[ClassifiedPr]) -> Vec<u64> {
        prs.iter().map(|pr| pr.pr.number).collect()
    }

    #[test]
    fn test_is_bot_author() {
        assert!(is_bot_author("dependabot", "dependabot"));
        assert!(is_bot_author("dependabot[bot]", "dependabot"));
        assert!(is_bot_author("app/dependabot", "dependabot"));
        assert!(is_bot_author("Dependabot", "dependabot"));
        assert!(!is_bot_author("dependabot-fan", "dependabot"));
        assert!(!is_bot_author("alice", "dependabot"));
    }

    #[test]
    fn test_ignored_pr_dropped_even_when_allowed() {
        let policy = DenyListConfig::new(Vec::<String>::new(), Vec::new(), [2]);
        let prs = vec![
            pr(1, "Bump lodash from 1.0.0 to 1.0.1", "dependabot", green()),
            pr(2, "Bump express from 4.0.0 to 4.1.0", "dependabot", green()),
        ];

        let classified = classify(prs, &policy, DEFAULT_BOT_LOGIN, false);
        assert_eq!(numbers(&classified), vec![1]);
    }

    #[test]
    fn test_non_bot_authors_dropped() {
        let prs = vec![
            pr(1, "Bump lodash from 1.0.0 to 1.0.1", "alice", green()),
            pr(2, "Bump express from 4.0.0 to 4.1.0", "dependabot[bot]", green()),
        ];

        let classified = classify(prs, &DenyListConfig::default(), DEFAULT_BOT_LOGIN, false);
        assert_eq!(numbers(&classified), vec![2]);
    }

    #[test]
    fn test_denied_pr_kept_but_skipped() {
        let policy = DenyListConfig::new(["github.com/aws/aws-sdk-go"], ["datadog"], []);
        let prs = vec![
            pr(
                1,
                "Bump github.com/aws/aws-sdk-go from 1.55.7 to 1.55.8",
                "dependabot",
                green(),
            ),
            pr(
                2,
                "⬆️ (deps): Bump the aws-sdk-go-v2 group with 4 updates",
                "dependabot",
                green(),
            ),
            pr(
                3,
                "⬆️ (deps): bump gopkg.in/DataDog/dd-trace-go.v1 from 1.73.1 to 1.74.2",
                "dependabot",
                green(),
            ),
        ];

        let classified = classify(prs, &policy, DEFAULT_BOT_LOGIN, false);
        assert_eq!(numbers(&classified), vec![1, 2, 3]);
        assert!(classified[0].is_skipped());
        assert_eq!(
            classified[0].skip_reason(),
            "package 'github.com/aws/aws-sdk-go' is denied"
        );
        assert!(!classified[1].is_skipped());
        assert_eq!(classified[1].identity.package_name, "aws-sdk-go-v2");
        assert_eq!(classified[2].skip_reason(), "org 'datadog' is denied");

        let actionable: Vec<u64> = actionable(&classified).map(|c| c.pr.number).collect();
        assert_eq!(actionable, vec![2]);
    }

    #[test]
    fn test_skip_failing_drops_non_green() {
        let prs = vec![
            pr(1, "Bump a from 1 to 2", "dependabot", green()),
            pr(
                2,
                "Bump b from 1 to 2",
                "dependabot",
                vec![CheckInfo::running("ci/build", CheckRunStatus::InProgress)],
            ),
            pr(
                3,
                "Bump c from 1 to 2",
                "dependabot",
                vec![CheckInfo::completed("ci/build", CheckConclusion::Failure)],
            ),
            pr(4, "Bump d from 1 to 2", "dependabot", vec![]),
        ];

        let gated = classify(prs.clone(), &DenyListConfig::default(), DEFAULT_BOT_LOGIN, true);
        assert_eq!(numbers(&gated), vec![1]);

        let report = classify(prs, &DenyListConfig::default(), DEFAULT_BOT_LOGIN, false);
        assert_eq!(numbers(&report), vec![1, 2, 3, 4]);
        assert_eq!(report[1].ci_state, CiState::Pending);
        assert_eq!(report[2].ci_state, CiState::Failure);
        assert_eq!(report[3].ci_state, CiState::Pending);
    }

    #[test]
    fn test_unparseable_title_passes_policy() {
        let policy = DenyListConfig::new(["*"], ["datadog"], []);
        let prs = vec![pr(5, "Refresh lockfile", "dependabot", green())];

        let classified = classify(prs, &policy, DEFAULT_BOT_LOGIN, true);
        assert_eq!(numbers(&classified), vec![5]);
        assert!(classified[0].identity.is_empty());
        assert!(!classified[0].is_skipped());
        assert_eq!(classified[0].skip_reason(), "");
    }

    #[test]
    fn test_order_preserved() {
        let prs = vec![
            pr(30, "Bump a from 1 to 2", "dependabot", green()),
            pr(10, "Bump b from 1 to 2", "dependabot", green()),
            pr(20, "Bump c from 1 to 2", "dependabot", green()),
        ];

        let classified = classify(prs, &DenyListConfig::default(), DEFAULT_BOT_LOGIN, false);
        assert_eq!(numbers(&classified), vec![30, 10, 20]);
    }
}
