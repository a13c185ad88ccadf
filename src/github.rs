use std::{future::Future, process::Command, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::debug;

use crate::{
    forge::Forge,
    stale::CLOSE_COMMENT,
    types::{
        Action, CheckConclusion, CheckInfo, CheckRunStatus, CheckState, MergeState, PullRequest,
        Repo, ReviewDecision,
    },
};

/// Bound applied to every GitHub request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Search pages fetched per listing; 100 PRs each.
const MAX_SEARCH_PAGES: usize = 20;

/// Environment variables consulted for a token, in order, after the
/// command line and the config file.
const TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN", "USER_GITHUB_TOKEN"];

/// Finds a GitHub token: explicit value, then config file, then the
/// environment, then the `gh` CLI.
pub fn resolve_token(explicit: Option<&str>, from_config: Option<&str>) -> Result<String> {
    let configured = [explicit, from_config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty());
    if let Some(token) = configured {
        return Ok(token.to_string());
    }

    for var in TOKEN_ENV_VARS {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                debug!("Using GitHub token from {}", var);
                return Ok(token.trim().to_string());
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("No GitHub token configured and the gh CLI could not be run")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(&mut self, repo: &Repo) -> &mut Self {
        self.terms.push(format!("repo:{}", repo));
        self
    }

    pub fn pr_type(&mut self) -> &mut Self {
        self.terms.push("is:pr".to_string());
        self
    }

    pub fn open(&mut self) -> &mut Self {
        self.terms.push("is:open".to_string());
        self
    }

    /// Bot accounts are searched as `app/<login>`.
    pub fn app_author(&mut self, login: &str) -> &mut Self {
        self.terms.push(format!("author:app/{}", login));
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

/// Search query listing the open PRs of a repository.
pub fn open_pull_requests_query(repo: &Repo, author: Option<&str>) -> String {
    let mut builder = SearchQueryBuilder::new();
    builder.repo(repo).pr_type().open();
    if let Some(author) = author {
        builder.app_author(author);
    }
    builder.build()
}

const SEARCH_QUERY: &str = r#"
    query($query: String!, $after: String) {
        search(query: $query, type: ISSUE, first: 100, after: $after) {
            nodes {
                ... on PullRequest {
                    id
                    number
                    title
                    url
                    createdAt
                    mergeStateStatus
                    reviewDecision
                    author {
                        login
                        __typename
                    }
                    labels(first: 20) {
                        nodes {
                            name
                        }
                    }
                    statusCheckRollup {
                        contexts(first: 100) {
                            nodes {
                                __typename
                                ... on CheckRun {
                                    name
                                    status
                                    conclusion
                                }
                                ... on StatusContext {
                                    context
                                    state
                                }
                            }
                        }
                    }
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
"#;

const AUTO_MERGE_MUTATION: &str = r#"
    mutation($pullRequestId: ID!) {
        enablePullRequestAutoMerge(input: {pullRequestId: $pullRequestId, mergeMethod: SQUASH}) {
            clientMutationId
        }
    }
"#;

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

impl<T> GraphQLResponse<T> {
    fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            anyhow::bail!("GraphQL errors: {}", messages.join("; "));
        }
        self.data.context("GraphQL response contained no data")
    }
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResults {
    nodes: Vec<GraphQLPullRequest>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLPullRequest {
    id: String,
    number: u64,
    title: String,
    url: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    merge_state_status: MergeState,
    review_decision: Option<ReviewDecision>,
    author: Option<GraphQLAuthor>,
    labels: GraphQLConnection<GraphQLLabel>,
    status_check_rollup: Option<GraphQLStatusCheckRollup>,
}

#[derive(Debug, Deserialize)]
struct GraphQLAuthor {
    login: String,
    #[serde(rename = "__typename")]
    typename: String,
}

impl GraphQLAuthor {
    /// Bots are shown as `login[bot]`, matching the REST API.
    fn display_format(&self) -> String {
        if self.typename == "Bot" {
            format!("{}[bot]", self.login)
        } else {
            self.login.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLConnection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GraphQLLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GraphQLStatusCheckRollup {
    contexts: GraphQLConnection<GraphQLStatusContext>,
}

#[derive(Debug, Deserialize)]
struct GraphQLStatusContext {
    #[serde(rename = "__typename")]
    typename: String,
    // CheckRun
    name: Option<String>,
    status: Option<CheckRunStatus>,
    conclusion: Option<CheckConclusion>,
    // StatusContext
    context: Option<String>,
    state: Option<CheckState>,
}

fn convert_status_context(context: GraphQLStatusContext) -> CheckInfo {
    match context.typename.as_str() {
        "StatusContext" => CheckInfo::status(
            context
                .context
                .unwrap_or_else(|| "Unknown Status".to_string()),
            context.state.unwrap_or(CheckState::Unknown),
        ),
        _ => CheckInfo {
            name: context.name.unwrap_or_else(|| "Unknown Check".to_string()),
            run_status: context.status,
            conclusion: context.conclusion,
            status_state: None,
        },
    }
}

fn convert_pull_request(repo: &Repo, pr: GraphQLPullRequest) -> PullRequest {
    let checks = pr
        .status_check_rollup
        .map(|rollup| {
            rollup
                .contexts
                .nodes
                .into_iter()
                .map(convert_status_context)
                .collect()
        })
        .unwrap_or_default();

    PullRequest {
        repo: repo.clone(),
        number: pr.number,
        node_id: pr.id,
        title: pr.title,
        url: pr.url,
        author_login: pr
            .author
            .as_ref()
            .map(GraphQLAuthor::display_format)
            .unwrap_or_else(|| "ghost".to_string()),
        labels: pr.labels.nodes.into_iter().map(|label| label.name).collect(),
        created_at: pr.created_at,
        merge_state: pr.merge_state_status,
        review_decision: pr.review_decision,
        checks,
    }
}

/// GitHub-backed forge using octocrab.
pub struct GitHub {
    client: Octocrab,
    bot: String,
}

impl GitHub {
    pub fn new(token: String, bot: impl Into<String>) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            bot: bot.into(),
        })
    }

    async fn call<T, Fut>(&self, what: &str, request: Fut) -> Result<T>
    where
        Fut: Future<Output = octocrab::Result<T>>,
    {
        match tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT, request).await {
            Ok(result) => result.with_context(|| format!("GitHub request failed: {}", what)),
            Err(_) => anyhow::bail!(
                "GitHub request timed out after {}s: {}",
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
                what
            ),
        }
    }

    async fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        self.call(
            &format!("comment on {}#{}", pr.repo, pr.number),
            self.client
                .issues(pr.repo.owner(), pr.repo.name())
                .create_comment(pr.number, body),
        )
        .await?;
        Ok(())
    }

    async fn approve(&self, pr: &PullRequest) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            pr.repo.owner(),
            pr.repo.name(),
            pr.number
        );
        let body = serde_json::json!({ "event": "APPROVE" });

        let _: serde_json::Value = self
            .call(
                &format!("approve {}#{}", pr.repo, pr.number),
                self.client.post(route, Some(&body)),
            )
            .await?;
        Ok(())
    }

    async fn enable_auto_merge(&self, pr: &PullRequest) -> Result<()> {
        let query = serde_json::json!({
            "query": AUTO_MERGE_MUTATION,
            "variables": { "pullRequestId": pr.node_id },
        });

        let response: GraphQLResponse<serde_json::Value> = self
            .call(
                &format!("enable auto-merge on {}#{}", pr.repo, pr.number),
                self.client.graphql(&query),
            )
            .await?;
        response.into_data()?;
        Ok(())
    }

    async fn close(&self, pr: &PullRequest) -> Result<()> {
        self.comment(pr, CLOSE_COMMENT).await?;

        let route = format!(
            "/repos/{}/{}/pulls/{}",
            pr.repo.owner(),
            pr.repo.name(),
            pr.number
        );
        let body = serde_json::json!({ "state": "closed" });

        let _: serde_json::Value = self
            .call(
                &format!("close {}#{}", pr.repo, pr.number),
                self.client.patch(route, Some(&body)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        author: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        let search_query = open_pull_requests_query(repo, author);
        debug!("Searching: {}", search_query);

        let mut prs = Vec::new();
        let mut after_cursor: Option<String> = None;

        for page in 1..=MAX_SEARCH_PAGES {
            let query = serde_json::json!({
                "query": SEARCH_QUERY,
                "variables": {
                    "query": search_query,
                    "after": after_cursor,
                },
            });

            let response: GraphQLResponse<SearchData> = self
                .call(
                    &format!("search {} (page {})", repo, page),
                    self.client.graphql(&query),
                )
                .await?;
            let results = response.into_data()?.search;

            prs.extend(
                results
                    .nodes
                    .into_iter()
                    .map(|pr| convert_pull_request(repo, pr)),
            );

            if !results.page_info.has_next_page {
                break;
            }

            after_cursor = results.page_info.end_cursor;
            if after_cursor.is_none() {
                break;
            }
        }

        Ok(prs)
    }

    async fn apply_action(&self, pr: &PullRequest, action: Action) -> Result<()> {
        match action {
            Action::Approve => self.approve(pr).await,
            Action::RequestRebase => self.comment(pr, &format!("@{} rebase", self.bot)).await,
            Action::RequestRecreate => self.comment(pr, &format!("@{} recreate", self.bot)).await,
            Action::EnableAutoMerge => self.enable_auto_merge(pr).await,
            Action::Close => self.close(pr).await,
        }
    }
}
