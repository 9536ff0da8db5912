use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    commands::{Task, generate_tasks},
    config::Config,
    error::Result,
    fetch::fetch_all,
    select::select,
    types::{Forge, RepositoryPrs},
};

/// Outcome of one run: the selected pull requests and the tasks to
/// perform on them.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub repositories: Vec<RepositoryPrs>,
    pub tasks: Vec<Task>,
}

impl RunResult {
    pub fn pr_count(&self) -> usize {
        self.repositories.iter().map(|r| r.prs.len()).sum()
    }
}

/// Fetches, selects and resolves actions for the configured run.
///
/// The config is validated before any search is issued. Throttling is
/// evaluated against the moment the fetch completed.
#[instrument(skip_all, fields(query = %config.search_query))]
pub async fn run<F>(config: &Config, forge: &F, cancel: &CancellationToken) -> Result<RunResult>
where
    F: Forge + ?Sized,
{
    config.validate()?;

    let fetched = fetch_all(forge, &config.repositories, &config.search_query, cancel).await?;
    let repositories = select(fetched, &config.parsed_prs);
    let tasks = generate_tasks(&repositories, &config.actions, config.throttle, Utc::now());

    let result = RunResult {
        repositories,
        tasks,
    };
    info!(
        pr_count = result.pr_count(),
        task_count = result.tasks.len(),
        "Run complete"
    );

    Ok(result)
}
