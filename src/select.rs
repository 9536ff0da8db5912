use std::collections::HashSet;

use tracing::debug;

use crate::types::{PullRequestRef, Repo, RepositoryPrs};

/// Narrows fetched results to the explicitly referenced pull requests.
///
/// With no references every result passes through unchanged. Otherwise
/// each repository keeps only the pull requests named by a reference
/// that applies to it; a repository with no applicable reference keeps
/// none.
pub fn select(results: Vec<RepositoryPrs>, refs: &[PullRequestRef]) -> Vec<RepositoryPrs> {
    if refs.is_empty() {
        return results;
    }

    results
        .into_iter()
        .map(|mut repo_prs| {
            let wanted = inclusion_set(&repo_prs.repo, refs);
            let before = repo_prs.prs.len();
            repo_prs.prs.retain(|pr| wanted.contains(&pr.number));
            debug!(
                repo = %repo_prs.repo,
                before,
                after = repo_prs.prs.len(),
                "Applied PR selection"
            );
            repo_prs
        })
        .collect()
}

fn inclusion_set(repo: &Repo, refs: &[PullRequestRef]) -> HashSet<u64> {
    refs.iter()
        .filter(|r| r.applies_to(repo))
        .map(|r| r.number)
        .collect()
}
