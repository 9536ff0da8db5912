use std::io::Write;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::{
    actions::{Action, applicable_actions},
    throttle::is_throttled_at,
    types::{Repo, RepositoryPrs},
};

/// One comment to post on one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub repo: Repo,
    pub pr_number: u64,
    pub action: Action,
}

impl Task {
    /// Renders the `gh` invocation that posts this task's comment.
    ///
    /// Only double quotes in the body are escaped.
    pub fn command(&self) -> String {
        format!(
            "gh pr comment --repo {} {} --body \"{}\"",
            self.repo,
            self.pr_number,
            self.action.comment.replace('"', "\\\"")
        )
    }
}

/// Resolves which actions fire for every pull request, dropping those
/// throttled by a recent identical comment.
///
/// Tasks are ordered by repository, then pull request, then action, in
/// the order each was given.
pub fn generate_tasks(
    results: &[RepositoryPrs],
    actions: &[Action],
    throttle: TimeDelta,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let mut tasks = Vec::new();

    for repo_prs in results {
        for pr in &repo_prs.prs {
            for action in applicable_actions(actions, &pr.labels) {
                if is_throttled_at(pr, &action.comment, throttle, now) {
                    continue;
                }
                tasks.push(Task {
                    repo: repo_prs.repo.clone(),
                    pr_number: pr.number,
                    action: action.clone(),
                });
            }
        }
    }

    debug!(task_count = tasks.len(), "Generated tasks");
    tasks
}

pub fn output_commands<W: Write>(tasks: &[Task], writer: &mut W) -> std::io::Result<()> {
    for task in tasks {
        writeln!(writer, "{}", task.command())?;
    }
    Ok(())
}
