use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Error, Result},
    query::repository_query,
    types::{Forge, Repo, RepositoryPrs},
};

/// Searches every repository concurrently and joins the results.
///
/// Any failing repository aborts the whole fetch: the searches still in
/// flight are dropped and no partial results are returned. Cancelling
/// `cancel` does the same and yields [`Error::Cancelled`].
///
/// Results are sorted by repository, and each repository's pull
/// requests by number, highest first, so the output does not depend on
/// which search finished first.
#[instrument(skip(forge, cancel), fields(repo_count = repositories.len()))]
pub async fn fetch_all<F>(
    forge: &F,
    repositories: &[Repo],
    query: &str,
    cancel: &CancellationToken,
) -> Result<Vec<RepositoryPrs>>
where
    F: Forge + ?Sized,
{
    let mut searches: FuturesUnordered<_> = repositories
        .iter()
        .map(|repo| async move {
            let search_query = repository_query(repo, query);
            debug!(%repo, query = %search_query, "Searching repository");
            let result = forge.search(repo, &search_query).await;
            (repo, result)
        })
        .collect();

    let mut results = Vec::with_capacity(repositories.len());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(pending = searches.len(), "Fetch cancelled");
                return Err(Error::Cancelled);
            }
            next = searches.next() => next,
        };

        let Some((repo, result)) = next else {
            break;
        };

        match result {
            Ok(prs) => {
                debug!(%repo, pr_count = prs.len(), "Repository search completed");
                results.push(RepositoryPrs {
                    repo: repo.clone(),
                    prs,
                });
            }
            Err(e) => {
                warn!(%repo, error = %e, pending = searches.len(), "Repository search failed");
                return Err(Error::fetch(repo.clone(), e));
            }
        }
    }

    results.sort_by(|a, b| a.repo.cmp(&b.repo));
    for repo_prs in &mut results {
        repo_prs.prs.sort_by(|a, b| b.number.cmp(&a.number));
    }

    info!(
        pr_count = results.iter().map(|r| r.prs.len()).sum::<usize>(),
        "Fetched pull requests"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::types::PullRequest;

    fn pr(repo: &Repo, number: u64) -> PullRequest {
        PullRequest {
            repo: repo.clone(),
            number,
            title: format!("PR {number}"),
            author_login: "alice".to_string(),
            labels: vec![],
            url: format!("https://github.com/{repo}/pull/{number}"),
            state: "OPEN".to_string(),
            checks: vec![],
            comments: vec![],
        }
    }

    enum Reply {
        Prs(Vec<u64>),
        Fail,
        Hang,
    }

    struct ScriptedForge {
        replies: HashMap<String, Reply>,
        queries: Mutex<Vec<String>>,
        calls: AtomicUsize,
        hanging: CancellationToken,
    }

    impl ScriptedForge {
        fn new(replies: Vec<(&str, Reply)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|(repo, reply)| (repo.to_string(), reply))
                    .collect(),
                queries: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                hanging: CancellationToken::new(),
            }
        }
    }

    #[async_trait]
    impl Forge for ScriptedForge {
        async fn search(&self, repo: &Repo, query: &str) -> anyhow::Result<Vec<PullRequest>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            match self.replies.get(&repo.to_string()) {
                Some(Reply::Prs(numbers)) => Ok(numbers.iter().map(|n| pr(repo, *n)).collect()),
                Some(Reply::Fail) => anyhow::bail!("backend unavailable"),
                Some(Reply::Hang) => {
                    self.hanging.cancel();
                    std::future::pending().await
                }
                None => Ok(vec![]),
            }
        }
    }

    fn repos(names: &[&str]) -> Vec<Repo> {
        names.iter().map(|n| Repo::parse(n).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_sorts_results() {
        let forge = ScriptedForge::new(vec![
            ("z/last", Reply::Prs(vec![3, 10, 7])),
            ("a/first", Reply::Prs(vec![1, 2])),
        ]);

        let results = fetch_all(
            &forge,
            &repos(&["z/last", "a/first"]),
            "label:bug",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].repo.to_string(), "a/first");
        assert_eq!(results[1].repo.to_string(), "z/last");
        let numbers: Vec<u64> = results[1].prs.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![10, 7, 3]);
    }

    #[tokio::test]
    async fn test_fetch_all_scopes_query_per_repository() {
        let forge = ScriptedForge::new(vec![]);
        fetch_all(
            &forge,
            &repos(&["o/a", "o/b"]),
            "author:bob",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let mut queries = forge.queries.lock().unwrap().clone();
        queries.sort();
        assert_eq!(
            queries,
            vec![
                "repo:o/a type:pr state:open author:bob",
                "repo:o/b type:pr state:open author:bob",
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_fails_fast() {
        let forge = ScriptedForge::new(vec![("o/good", Reply::Hang), ("o/bad", Reply::Fail)]);

        let err = fetch_all(
            &forge,
            &repos(&["o/good", "o/bad"]),
            "",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            Error::Fetch { repo, source } => {
                assert_eq!(repo.to_string(), "o/bad");
                assert!(source.to_string().contains("backend unavailable"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_cancelled() {
        let forge = ScriptedForge::new(vec![("o/slow", Reply::Hang)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_all(&forge, &repos(&["o/slow"]), "", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_all_cancelled_while_in_flight() {
        let forge = ScriptedForge::new(vec![
            ("o/fast", Reply::Prs(vec![1, 2])),
            ("o/slow", Reply::Hang),
        ]);
        let cancel = CancellationToken::new();

        let canceller = tokio::spawn({
            let hanging = forge.hanging.clone();
            let cancel = cancel.clone();
            async move {
                hanging.cancelled().await;
                cancel.cancel();
            }
        });

        let err = fetch_all(&forge, &repos(&["o/fast", "o/slow"]), "", &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert!(forge.hanging.is_cancelled());
        assert_eq!(forge.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_no_repositories() {
        let forge = ScriptedForge::new(vec![]);
        let results = fetch_all(&forge, &[], "", &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(forge.calls.load(Ordering::SeqCst), 0);
    }
}
