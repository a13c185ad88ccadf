use tracing::{info, warn};

use crate::{
    classify::{ClassifiedPr, actionable},
    forge::Forge,
    types::{Action, MergeState, PullRequest, Repo},
};

/// What a run does with the actionable pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Approve and enable auto-merge, repairing branches that need it.
    Approve,
    /// Ask the bot to recreate every PR.
    Recreate,
    /// Report only.
    Check,
}

impl Mode {
    /// Whether PRs with CI other than success are dropped before planning.
    pub fn skips_failing(&self) -> bool {
        matches!(self, Mode::Approve)
    }
}

/// One action to apply to one pull request.
#[derive(Debug, Clone)]
pub struct Task {
    pub pr: PullRequest,
    pub action: Action,
}

/// Plans the actions for a mode. Denied PRs produce no tasks; order
/// follows the input, and the actions for one PR are adjacent.
pub fn plan_tasks(prs: &[ClassifiedPr], mode: Mode) -> Vec<Task> {
    let mut tasks = Vec::new();

    for classified in actionable(prs) {
        let pr = &classified.pr;
        let actions = match mode {
            Mode::Check => vec![],
            Mode::Recreate => vec![Action::RequestRecreate],
            Mode::Approve => approve_actions(pr),
        };

        tasks.extend(actions.into_iter().map(|action| Task {
            pr: pr.clone(),
            action,
        }));
    }

    tasks
}

fn approve_actions(pr: &PullRequest) -> Vec<Action> {
    let mut actions = Vec::with_capacity(3);

    match pr.merge_state {
        // Conflicts block merging; nothing else is attempted this pass.
        MergeState::Dirty => return vec![Action::RequestRecreate],
        MergeState::Behind => actions.push(Action::RequestRebase),
        _ => {}
    }

    if !pr.is_approved() {
        actions.push(Action::Approve);
    }
    actions.push(Action::EnableAutoMerge);

    actions
}

/// Result of applying one task.
#[derive(Debug)]
pub struct ActionOutcome {
    pub repo: Repo,
    pub number: u64,
    pub title: String,
    pub action: Action,
    pub result: anyhow::Result<()>,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a batch, in execution order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ActionOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn extend(&mut self, other: BatchSummary) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Applies tasks one after another. A failed task is logged and recorded;
/// the remaining tasks still run.
pub async fn execute_tasks<F>(forge: &F, tasks: Vec<Task>) -> BatchSummary
where
    F: Forge + Sync + ?Sized,
{
    let mut summary = BatchSummary::default();

    for task in tasks {
        let result = forge.apply_action(&task.pr, task.action).await;

        match &result {
            Ok(()) => info!(
                "{} {}#{}: {}",
                task.action, task.pr.repo, task.pr.number, task.pr.title
            ),
            Err(e) => warn!(
                "Failed to {} {}#{}: {:#}",
                task.action, task.pr.repo, task.pr.number, e
            ),
        }

        summary.outcomes.push(ActionOutcome {
            repo: task.pr.repo,
            number: task.pr.number,
            title: task.pr.title,
            action: task.action,
            result,
        });
    }

    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        policy::DenyReason,
        types::{CiState, PackageIdentity, ReviewDecision},
    };

    fn classified(number: u64, merge_state: MergeState, approved: bool) -> ClassifiedPr {
        ClassifiedPr {
            pr: PullRequest {
                repo: Repo::new("owner", "repo").unwrap(),
                number,
                node_id: format!("PR_{number}"),
                title: format!("Bump pkg{number} from 1 to 2"),
                url: format!("https://github.com/owner/repo/pull/{number}"),
                author_login: "dependabot[bot]".to_string(),
                labels: vec![],
                created_at: Utc::now(),
                merge_state,
                review_decision: approved.then_some(ReviewDecision::Approved),
                checks: vec![],
            },
            identity: PackageIdentity::new(format!("pkg{number}"), ""),
            ci_state: CiState::Success,
            deny_reason: None,
        }
    }

    fn plan(prs: &[ClassifiedPr], mode: Mode) -> Vec<(u64, Action)> {
        plan_tasks(prs, mode)
            .into_iter()
            .map(|task| (task.pr.number, task.action))
            .collect()
    }

    #[test]
    fn test_approve_clean() {
        let prs = vec![classified(1, MergeState::Clean, false)];
        assert_eq!(
            plan(&prs, Mode::Approve),
            vec![(1, Action::Approve), (1, Action::EnableAutoMerge)]
        );
    }

    #[test]
    fn test_approve_dirty_only_recreates() {
        let prs = vec![
            classified(1, MergeState::Dirty, false),
            classified(2, MergeState::Dirty, true),
        ];
        assert_eq!(
            plan(&prs, Mode::Approve),
            vec![(1, Action::RequestRecreate), (2, Action::RequestRecreate)]
        );
    }

    #[test]
    fn test_approve_behind_rebases_first() {
        let prs = vec![classified(3, MergeState::Behind, false)];
        assert_eq!(
            plan(&prs, Mode::Approve),
            vec![
                (3, Action::RequestRebase),
                (3, Action::Approve),
                (3, Action::EnableAutoMerge)
            ]
        );
    }

    #[test]
    fn test_approve_skips_review_when_already_approved() {
        let prs = vec![
            classified(4, MergeState::Blocked, true),
            classified(5, MergeState::Behind, true),
        ];
        assert_eq!(
            plan(&prs, Mode::Approve),
            vec![
                (4, Action::EnableAutoMerge),
                (5, Action::RequestRebase),
                (5, Action::EnableAutoMerge)
            ]
        );
    }

    #[test]
    fn test_recreate_and_check_modes() {
        let prs = vec![
            classified(1, MergeState::Clean, true),
            classified(2, MergeState::Dirty, false),
        ];
        assert_eq!(
            plan(&prs, Mode::Recreate),
            vec![(1, Action::RequestRecreate), (2, Action::RequestRecreate)]
        );
        assert!(plan(&prs, Mode::Check).is_empty());
    }

    #[test]
    fn test_denied_prs_have_no_tasks() {
        let mut denied = classified(1, MergeState::Clean, false);
        denied.deny_reason = Some(DenyReason::Package("pkg1".to_string()));
        let prs = vec![denied, classified(2, MergeState::Clean, true)];

        assert_eq!(plan(&prs, Mode::Approve), vec![(2, Action::EnableAutoMerge)]);
        assert_eq!(plan(&prs, Mode::Recreate), vec![(2, Action::RequestRecreate)]);
    }

    #[test]
    fn test_mode_skips_failing() {
        assert!(Mode::Approve.skips_failing());
        assert!(!Mode::Recreate.skips_failing());
        assert!(!Mode::Check.skips_failing());
    }

    #[test]
    fn test_batch_summary_counts() {
        let repo = Repo::new("owner", "repo").unwrap();
        let outcome = |number, result| ActionOutcome {
            repo: repo.clone(),
            number,
            title: String::new(),
            action: Action::Approve,
            result,
        };

        let mut summary = BatchSummary {
            outcomes: vec![outcome(1, Ok(())), outcome(2, Err(anyhow::anyhow!("boom")))],
        };
        summary.extend(BatchSummary {
            outcomes: vec![outcome(3, Ok(()))],
        });

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures().map(|o| o.number).collect::<Vec<_>>(), vec![2]);
    }
}
