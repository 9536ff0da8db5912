use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::types::{CheckConclusion, CheckInfo, CheckState, CommentInfo, Forge, PullRequest, Repo};

/// GitHub search returns at most 1000 results, i.e. ten pages of 100.
const MAX_PAGES: usize = 10;

/// Labels fetched per pull request (`labels(first: 100)` in the query).
/// Label predicates only see this many; a truncated set is logged.
const MAX_LABELS: usize = 100;

#[derive(Debug, Deserialize)]
struct RateLimitInfo {
    limit: u32,
    remaining: u32,
    reset: u64,
    used: u32,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    search: RateLimitInfo,
    graphql: RateLimitInfo,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

fn format_reset_time(reset: u64) -> String {
    i64::try_from(reset)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn log_rate_limit(context: &str, api_type: &str, info: &RateLimitInfo, low_water_mark: u32) {
    let reset_time = format_reset_time(info.reset);

    debug!(
        target: "prsweep::rate_limit",
        context,
        api_type,
        limit = info.limit,
        remaining = info.remaining,
        used = info.used,
        reset_time,
        "GitHub API rate limit status"
    );

    if info.remaining < low_water_mark {
        warn!(
            target: "prsweep::rate_limit",
            api_type,
            remaining = info.remaining,
            reset_time,
            "Low GitHub API rate limit remaining"
        );
    }
}

/// Checks GitHub API rate limit status and logs the results.
///
/// Only the search and GraphQL categories matter here; both are logged
/// at debug level and warned about when nearly exhausted.
#[instrument(skip(octocrab), target = "prsweep::rate_limit")]
async fn check_rate_limit(octocrab: &Octocrab, context: &str) -> Result<()> {
    let rate_limit: RateLimitResponse = octocrab
        .get("/rate_limit", None::<&()>)
        .await
        .map_err(|e| anyhow::anyhow!("Rate limit check failed: {e}"))?;

    log_rate_limit(context, "graphql", &rate_limit.resources.graphql, 10);
    log_rate_limit(context, "search", &rate_limit.resources.search, 5);

    Ok(())
}

/// Builds search request payloads from the embedded GraphQL document.
struct GraphQLQueryBuilder {
    query: &'static str,
    variables: HashMap<String, serde_json::Value>,
}

impl GraphQLQueryBuilder {
    fn search_pull_requests() -> Self {
        Self {
            query: include_str!("github/search_prs.graphql"),
            variables: HashMap::new(),
        }
    }

    fn with_search_query(mut self, query: &str) -> Self {
        self.variables.insert("query".to_string(), query.into());
        self
    }

    fn with_after_cursor(mut self, cursor: Option<String>) -> Self {
        self.variables.insert(
            "after".to_string(),
            cursor.map_or(serde_json::Value::Null, Into::into),
        );
        self
    }

    fn build(self) -> serde_json::Value {
        serde_json::json!({
            "query": self.query,
            "variables": self.variables
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: SearchData,
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
    number: u64,
    title: String,
    url: String,
    state: String,
    author: Option<GraphQLAuthor>,
    labels: GraphQLLabelConnection,
    status_check_rollup: Option<GraphQLStatusCheckRollup>,
    comments: GraphQLCommentConnection,
}

#[derive(Debug, Deserialize)]
struct GraphQLAuthor {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLLabelConnection {
    nodes: Vec<GraphQLLabel>,
    #[serde(default)]
    page_info: Option<LabelPageInfo>,
}

impl GraphQLLabelConnection {
    fn is_truncated(&self) -> bool {
        self.page_info.as_ref().is_some_and(|p| p.has_next_page)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelPageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct GraphQLLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GraphQLStatusCheckRollup {
    contexts: GraphQLStatusContextConnection,
}

#[derive(Debug, Deserialize)]
struct GraphQLStatusContextConnection {
    nodes: Vec<GraphQLStatusContext>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum GraphQLStatusContext {
    #[serde(rename_all = "camelCase")]
    CheckRun {
        name: Option<String>,
        conclusion: Option<CheckConclusion>,
        details_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StatusContext {
        context: Option<String>,
        state: Option<CheckState>,
        target_url: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct GraphQLCommentConnection {
    nodes: Vec<GraphQLComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLComment {
    body: String,
    created_at: String,
    author: Option<GraphQLAuthor>,
}

fn login_or_unknown(author: Option<GraphQLAuthor>) -> String {
    author.map_or_else(|| "Unknown".to_string(), |a| a.login)
}

fn convert_status_context(context: GraphQLStatusContext) -> Option<CheckInfo> {
    match context {
        GraphQLStatusContext::CheckRun {
            name,
            conclusion,
            details_url,
        } => Some(CheckInfo {
            name: name.unwrap_or_else(|| "Unknown Check".to_string()),
            conclusion,
            status_state: None,
            url: details_url,
        }),
        GraphQLStatusContext::StatusContext {
            context,
            state,
            target_url,
        } => Some(CheckInfo {
            name: context.unwrap_or_else(|| "Unknown Status".to_string()),
            conclusion: None,
            status_state: state,
            url: target_url,
        }),
        GraphQLStatusContext::Other => None,
    }
}

fn convert_pull_request(graphql_pr: GraphQLPullRequest, repo: &Repo) -> PullRequest {
    let checks = graphql_pr
        .status_check_rollup
        .map(|rollup| {
            rollup
                .contexts
                .nodes
                .into_iter()
                .filter_map(convert_status_context)
                .collect()
        })
        .unwrap_or_default();

    let comments = graphql_pr
        .comments
        .nodes
        .into_iter()
        .map(|comment| CommentInfo {
            body: comment.body,
            created_at: comment.created_at,
            author_login: login_or_unknown(comment.author),
        })
        .collect();

    if graphql_pr.labels.is_truncated() {
        warn!(
            %repo,
            pr_number = graphql_pr.number,
            max_labels = MAX_LABELS,
            "Pull request has more labels than were fetched; label predicates may misfire"
        );
    }

    PullRequest {
        repo: repo.clone(),
        number: graphql_pr.number,
        title: graphql_pr.title,
        author_login: login_or_unknown(graphql_pr.author),
        labels: graphql_pr
            .labels
            .nodes
            .into_iter()
            .map(|label| label.name)
            .collect(),
        url: graphql_pr.url,
        state: graphql_pr.state,
        checks,
        comments,
    }
}

/// Obtains a GitHub authentication token.
///
/// Tries, in order, `GITHUB_TOKEN`, `GH_TOKEN` and `gh auth token`.
#[instrument]
async fn get_github_token() -> Result<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            debug!("Using {var} environment variable");
            return Ok(token.trim().to_string());
        }
    }

    debug!("Fetching token from gh CLI");
    let output = tokio::process::Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        error!("gh CLI authentication failed");
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// GitHub search backend using the GraphQL API.
pub struct GitHub {
    octocrab: Octocrab,
}

impl GitHub {
    /// Creates an authenticated client.
    #[instrument]
    pub async fn connect() -> Result<Self> {
        let token = get_github_token()
            .await
            .context("Failed to obtain GitHub authentication token")?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;

        if let Err(e) = check_rate_limit(&octocrab, "startup").await {
            debug!(error = %e, "Rate limit check failed, continuing anyway");
        }

        Ok(Self { octocrab })
    }

    async fn execute_graphql_query(
        &self,
        query: serde_json::Value,
        context: &str,
    ) -> Result<GraphQLResponse> {
        self.octocrab.graphql(&query).await.map_err(|e| {
            let error_msg = match &e {
                octocrab::Error::GitHub { source, .. } => {
                    format!("GitHub API error: {}", source.message)
                }
                octocrab::Error::Serde { source, .. } => {
                    warn!("JSON parsing errors often indicate GitHub API rate limiting");
                    format!("JSON parsing error: {source}")
                }
                _ => e.to_string(),
            };
            error!(context, error = %error_msg, "GraphQL query execution failed");
            anyhow::anyhow!("{context}: {error_msg}")
        })
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn verify_repository_exists(&self, repo: &Repo) -> Result<()> {
        match self.octocrab.repos(repo.owner(), repo.name()).get().await {
            Ok(_) => Ok(()),
            Err(octocrab::Error::GitHub { source, .. }) if source.message.contains("Not Found") => {
                anyhow::bail!("Repository '{repo}' does not exist or is not accessible")
            }
            Err(octocrab::Error::GitHub { source, .. }) => {
                anyhow::bail!("Failed to verify repository '{repo}': {}", source.message)
            }
            Err(e) => anyhow::bail!("Failed to verify repository '{repo}': {e}"),
        }
    }

    /// Runs a paginated search. A failing page fails the whole search.
    #[instrument(skip(self), fields(repo = %repo))]
    async fn fetch_prs_with_pagination(
        &self,
        repo: &Repo,
        search_query: &str,
    ) -> Result<Vec<PullRequest>> {
        let mut all_prs = Vec::new();
        let mut after_cursor: Option<String> = None;

        for page in 1..=MAX_PAGES {
            debug!(page, cursor = ?after_cursor, "Fetching page");

            let query = GraphQLQueryBuilder::search_pull_requests()
                .with_search_query(search_query)
                .with_after_cursor(after_cursor.take())
                .build();

            let context = format!("Search page {page} for '{search_query}'");
            let results = self.execute_graphql_query(query, &context).await?.data.search;

            all_prs.extend(
                results
                    .nodes
                    .into_iter()
                    .map(|graphql_pr| convert_pull_request(graphql_pr, repo)),
            );

            match results.page_info.end_cursor {
                Some(cursor) if results.page_info.has_next_page => after_cursor = Some(cursor),
                _ => break,
            }

            if page == MAX_PAGES {
                warn!(pages = MAX_PAGES, "Page limit reached, results truncated");
            }
        }

        info!(pr_count = all_prs.len(), "Search completed");
        Ok(all_prs)
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn search(&self, repo: &Repo, query: &str) -> Result<Vec<PullRequest>> {
        self.verify_repository_exists(repo).await?;
        self.fetch_prs_with_pagination(repo, query).await
    }
}
