use crate::types::Repo;

/// Failures surfaced by the query, fetch and resolution pipeline.
///
/// Configuration and reference errors are raised before any network
/// activity. A fetch error from any repository aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid pull request reference '{token}': {reason}")]
    ReferenceParse { token: String, reason: String },

    #[error("failed to search pull requests in {repo}: {source}")]
    Fetch {
        repo: Repo,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn reference(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ReferenceParse {
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(repo: Repo, source: anyhow::Error) -> Self {
        Error::Fetch {
            repo,
            source: source.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
