use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use prsweep::{
    CommentInfo, Config, DisplayMode, Error, Forge, PullRequest, Registry, Repo, RunResult,
    parse_args, run,
};
use tokio_util::sync::CancellationToken;

/// Mock GitHub hub for testing. Answers every search for a repository
/// with that repository's canned pull requests and records the queries
/// it was asked to run.
pub struct MockHub {
    mock_data: HashMap<String, Vec<PullRequest>>,
    failing: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl MockHub {
    pub fn new(mock_data: Vec<PullRequest>) -> Self {
        let mut by_repo: HashMap<String, Vec<PullRequest>> = HashMap::new();
        for pr in mock_data {
            by_repo.entry(pr.repo.to_string()).or_default().push(pr);
        }
        Self {
            mock_data: by_repo,
            failing: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, repo: &str) -> Self {
        self.failing.push(repo.to_string());
        self
    }

    fn queries(&self) -> Vec<String> {
        let mut queries = self.queries.lock().unwrap().clone();
        queries.sort();
        queries
    }
}

#[async_trait]
impl Forge for MockHub {
    async fn search(&self, repo: &Repo, query: &str) -> Result<Vec<PullRequest>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.failing.contains(&repo.to_string()) {
            anyhow::bail!("502 Bad Gateway");
        }
        Ok(self
            .mock_data
            .get(&repo.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

fn build_config(raw_args: &[&str]) -> Result<(Config, DisplayMode)> {
    let mut args = vec!["prsweep"];
    args.extend_from_slice(raw_args);
    parse_args(args, &Registry::embedded()?)
}

async fn run_prsweep_test(raw_args: &[&str], forge: &MockHub) -> Result<RunResult> {
    let (config, _) = build_config(raw_args)?;
    Ok(run(&config, forge, &CancellationToken::new()).await?)
}

fn commands(result: &RunResult) -> Vec<String> {
    result.tasks.iter().map(|t| t.command()).collect()
}

fn pr(repo: &str, number: u64, author: &str, labels: &[&str]) -> PullRequest {
    PullRequest {
        repo: Repo::parse(repo).unwrap(),
        number,
        title: format!("PR {number}"),
        author_login: author.to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        url: format!("https://github.com/{repo}/pull/{number}"),
        state: "OPEN".to_string(),
        checks: vec![],
        comments: vec![],
    }
}

fn with_comment(mut pr: PullRequest, body: &str, age: TimeDelta) -> PullRequest {
    pr.comments.push(CommentInfo {
        body: body.to_string(),
        created_at: (Utc::now() - age).to_rfc3339(),
        author_login: "someone".to_string(),
    });
    pr
}

#[tokio::test]
async fn test_approve_dependabot_prs() {
    let hub = MockHub::new(vec![pr("a/b", 10, "dependabot", &[])]);

    let result = run_prsweep_test(
        &["-r", "a/b", "--author", "dependabot", "--needs-approve", "--approve"],
        &hub,
    )
    .await
    .unwrap();

    assert_eq!(
        hub.queries(),
        vec!["repo:a/b type:pr state:open author:dependabot -label:approved"]
    );
    assert_eq!(
        commands(&result),
        vec![r#"gh pr comment --repo a/b 10 --body "/approve""#]
    );
}

#[tokio::test]
async fn test_predicates_and_ordering_across_repositories() {
    let hub = MockHub::new(vec![
        pr("z/last", 1, "bob", &[]),
        pr("a/first", 3, "bob", &["approved"]),
        pr("a/first", 8, "bob", &["needs-ok-to-test"]),
    ]);

    let result = run_prsweep_test(
        &["-r", "z/last", "-r", "a/first", "/approve", "/ok-to-test"],
        &hub,
    )
    .await
    .unwrap();

    assert_eq!(
        commands(&result),
        vec![
            r#"gh pr comment --repo a/first 8 --body "/approve""#,
            r#"gh pr comment --repo a/first 8 --body "/ok-to-test""#,
            r#"gh pr comment --repo z/last 1 --body "/approve""#,
        ]
    );
    assert_eq!(result.pr_count(), 3);
}

#[tokio::test]
async fn test_one_failing_repository_fails_the_run() {
    let hub = MockHub::new(vec![pr("o/good", 1, "bob", &[])]).failing_for("o/bad");

    let err = run_prsweep_test(&["-r", "o/good", "-r", "o/bad", "--retest"], &hub)
        .await
        .unwrap_err();

    match err.downcast_ref::<Error>() {
        Some(Error::Fetch { repo, .. }) => assert_eq!(repo.to_string(), "o/bad"),
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_run_returns_no_results() {
    let hub = MockHub::new(vec![pr("o/r", 1, "bob", &[])]);
    let (config, _) = build_config(&["-r", "o/r", "--retest"]).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run(&config, &hub, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_selection_by_number_and_url() {
    let hub = MockHub::new(vec![
        pr("o/a", 5, "bob", &[]),
        pr("o/a", 4, "bob", &[]),
        pr("o/b", 5, "bob", &[]),
        pr("o/b", 2, "bob", &[]),
    ]);

    let result = run_prsweep_test(
        &["-r", "o/a", "5", "https://github.com/o/b/pull/2", "-c", "/hold"],
        &hub,
    )
    .await
    .unwrap();

    assert_eq!(
        commands(&result),
        vec![
            r#"gh pr comment --repo o/a 5 --body "/hold""#,
            r#"gh pr comment --repo o/b 5 --body "/hold""#,
            r#"gh pr comment --repo o/b 2 --body "/hold""#,
        ]
    );
}

#[tokio::test]
async fn test_url_only_selection_leaves_other_repositories_empty() {
    let hub = MockHub::new(vec![pr("o/a", 5, "bob", &[]), pr("o/b", 5, "bob", &[])]);

    let result = run_prsweep_test(
        &["-r", "o/b", "https://github.com/o/a/pull/5", "--retest"],
        &hub,
    )
    .await
    .unwrap();

    assert_eq!(result.repositories.len(), 2);
    assert!(result.repositories[1].prs.is_empty());
    assert_eq!(
        commands(&result),
        vec![r#"gh pr comment --repo o/a 5 --body "/retest""#]
    );
}

#[tokio::test]
async fn test_throttle_suppresses_recent_duplicates() {
    let hub = MockHub::new(vec![
        with_comment(pr("o/r", 3, "bob", &[]), "/retest", TimeDelta::minutes(5)),
        with_comment(pr("o/r", 2, "bob", &[]), "/retest", TimeDelta::hours(2)),
        with_comment(pr("o/r", 1, "bob", &[]), "/lgtm", TimeDelta::minutes(1)),
    ]);

    let result = run_prsweep_test(&["-r", "o/r", "--retest", "--throttle", "1h"], &hub)
        .await
        .unwrap();
    assert_eq!(
        commands(&result),
        vec![
            r#"gh pr comment --repo o/r 2 --body "/retest""#,
            r#"gh pr comment --repo o/r 1 --body "/retest""#,
        ]
    );

    let result = run_prsweep_test(&["-r", "o/r", "--retest"], &hub)
        .await
        .unwrap();
    assert_eq!(result.tasks.len(), 3);
}

#[tokio::test]
async fn test_custom_comment_quotes_are_escaped() {
    let hub = MockHub::new(vec![pr("o/r", 9, "bob", &[])]);

    let result = run_prsweep_test(&["-r", "o/r", "-c", r#"please "rebase""#], &hub)
        .await
        .unwrap();

    assert_eq!(
        commands(&result),
        vec![r#"gh pr comment --repo o/r 9 --body "please \"rebase\"""#]
    );
}

#[tokio::test]
async fn test_no_actions_lists_prs() {
    let hub = MockHub::new(vec![pr("o/r", 1, "bob", &[]), pr("o/r", 7, "bob", &[])]);

    let (config, mode) = build_config(&["-r", "o/r", "-q", "--label", "bug"]).unwrap();
    assert!(!config.has_actions());
    assert_eq!(mode, DisplayMode::Quiet);

    let result = run(&config, &hub, &CancellationToken::new()).await.unwrap();
    assert!(result.tasks.is_empty());
    let numbers: Vec<u64> = result.repositories[0].prs.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![7, 1]);
    assert_eq!(hub.queries(), vec!["repo:o/r type:pr state:open label:bug"]);
}
