//! prsweep: find pull requests across GitHub repositories and generate
//! bulk comment commands for them.
//!
//! Filter flags compose a GitHub search query, every repository is
//! searched concurrently, and the resulting pull requests are matched
//! against label-gated actions. Nothing is posted: the output is a list
//! of `gh pr comment` invocations.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod flags;
pub mod github;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod select;
pub mod throttle;
pub mod types;

pub use actions::{Action, LabelPredicate, applicable_actions};
pub use cli::parse_args;
pub use commands::{Task, generate_tasks, output_commands};
pub use config::{Config, DisplayMode};
pub use error::{Error, Result};
pub use fetch::fetch_all;
pub use flags::{FlagSelection, FlagValue, resolve_actions, resolve_query};
pub use github::GitHub;
pub use pipeline::{RunResult, run};
pub use query::{QueryTemplate, SearchQueryBuilder, compose, repository_query};
pub use registry::{ActionDefinition, Registry, Source};
pub use select::select;
pub use throttle::{is_throttled, is_throttled_at, parse_throttle_duration};
pub use types::{
    CheckConclusion, CheckInfo, CheckState, CiStatus, CommentInfo, Forge, PullRequest,
    PullRequestRef, Repo, RepositoryPrs,
};
