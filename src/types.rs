use std::{cmp::Ordering, fmt, sync::LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// A validated `owner/name` repository identifier.
///
/// Repositories order by their `owner/name` text so that results sort
/// the same way the identifiers read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();

        for part in [&owner, &name] {
            if part.is_empty() {
                return Err(Error::config(format!(
                    "repository must be in format 'owner/repo', got: '{owner}/{name}'"
                )));
            }
            if part.contains('/') || part.chars().any(char::is_whitespace) {
                return Err(Error::config(format!(
                    "invalid character in repository '{owner}/{name}'"
                )));
            }
        }

        Ok(Self { owner, name })
    }

    pub fn parse(repo: &str) -> Result<Self> {
        match repo.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(Error::config(format!(
                "repository must be in format 'owner/repo', got: '{repo}'"
            ))),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn text(&self) -> impl Iterator<Item = u8> + '_ {
        self.owner
            .bytes()
            .chain(std::iter::once(b'/'))
            .chain(self.name.bytes())
    }
}

impl Ord for Repo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text().cmp(other.text())
    }
}

impl PartialOrd for Repo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// Matches "/owner/repo/pull/123" with an optional trailing slash.
static PULL_REQUEST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/([^/]+)/pull/(\d+)/?$").expect("pull request path pattern is valid")
});

/// A positional pull request argument: a bare number or a PR URL.
///
/// A reference without a repository applies to every repository being
/// queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub repo: Option<Repo>,
}

impl PullRequestRef {
    pub fn parse(arg: &str) -> Result<Self> {
        if let Ok(number) = arg.parse::<u64>() {
            return Ok(Self { number, repo: None });
        }

        let url =
            Url::parse(arg).map_err(|_| Error::reference(arg, "not a PR number or PR URL"))?;

        let captures = PULL_REQUEST_PATH
            .captures(url.path())
            .ok_or_else(|| Error::reference(arg, "expected a URL like https://host/owner/repo/pull/123"))?;

        let repo = Repo::new(&captures[1], &captures[2])
            .map_err(|e| Error::reference(arg, e.to_string()))?;
        let number = captures[3]
            .parse::<u64>()
            .map_err(|_| Error::reference(arg, "PR number in URL is out of range"))?;

        Ok(Self {
            number,
            repo: Some(repo),
        })
    }

    /// Tests whether this reference targets the given repository.
    pub fn applies_to(&self, repo: &Repo) -> bool {
        self.repo.as_ref().is_none_or(|r| r == repo)
    }
}

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Success,
    Failure,
    Pending,
    Error,
    Expected,
    #[serde(other)]
    Unknown,
}

/// A single CI check run or commit status attached to a pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInfo {
    pub name: String,
    pub conclusion: Option<CheckConclusion>,
    pub status_state: Option<CheckState>,
    pub url: Option<String>,
}

impl CheckInfo {
    pub fn is_failed(&self) -> bool {
        matches!(
            self.conclusion,
            Some(
                CheckConclusion::Failure
                    | CheckConclusion::TimedOut
                    | CheckConclusion::ActionRequired
                    | CheckConclusion::StartupFailure
            )
        ) || matches!(
            self.status_state,
            Some(CheckState::Failure | CheckState::Error)
        )
    }

    pub fn is_pending(&self) -> bool {
        (self.conclusion.is_none() && self.status_state.is_none())
            || matches!(
                self.status_state,
                Some(CheckState::Pending | CheckState::Expected)
            )
    }
}

/// A pull request comment as fetched.
///
/// `created_at` is kept as the raw timestamp text; consumers decide what
/// to do with values that do not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentInfo {
    pub body: String,
    pub created_at: String,
    pub author_login: String,
}

/// Overall CI outcome of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiStatus {
    Passing,
    Failing,
    Pending,
    Unknown,
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CiStatus::Passing => "Passing",
            CiStatus::Failing => "Failing",
            CiStatus::Pending => "Pending",
            CiStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Read model of a pull request, owned by the fetch layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub repo: Repo,
    pub number: u64,
    pub title: String,
    pub author_login: String,
    pub labels: Vec<String>,
    pub url: String,
    pub state: String,
    pub checks: Vec<CheckInfo>,
    pub comments: Vec<CommentInfo>,
}

impl PullRequest {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn ci_status(&self) -> CiStatus {
        if self.checks.is_empty() {
            CiStatus::Unknown
        } else if self.checks.iter().any(CheckInfo::is_failed) {
            CiStatus::Failing
        } else if self.checks.iter().any(CheckInfo::is_pending) {
            CiStatus::Pending
        } else {
            CiStatus::Passing
        }
    }
}

/// Pull requests found in one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryPrs {
    pub repo: Repo,
    pub prs: Vec<PullRequest>,
}

/// Search capability for a code-hosting platform.
///
/// Implementations run one search query scoped to one repository and
/// return every matching pull request. Authentication, transport and
/// pagination are theirs to handle.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn search(&self, repo: &Repo, query: &str) -> anyhow::Result<Vec<PullRequest>>;
}
