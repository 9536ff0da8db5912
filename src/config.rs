use std::collections::BTreeSet;

use chrono::TimeDelta;

use crate::{
    actions::Action,
    error::{Error, Result},
    types::{PullRequestRef, Repo},
};

/// How results are listed when no action is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Normal,
    Quiet,
}

/// Everything one run needs, fixed before any network activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repositories: Vec<Repo>,
    pub parsed_prs: Vec<PullRequestRef>,
    pub actions: Vec<Action>,
    pub search_query: String,
    pub throttle: TimeDelta,
}

impl Config {
    /// Builds a config, sorting and de-duplicating the repositories.
    pub fn new(
        repositories: impl IntoIterator<Item = Repo>,
        parsed_prs: Vec<PullRequestRef>,
        actions: Vec<Action>,
        search_query: impl Into<String>,
        throttle: TimeDelta,
    ) -> Self {
        let repositories: BTreeSet<Repo> = repositories.into_iter().collect();
        Self {
            repositories: repositories.into_iter().collect(),
            parsed_prs,
            actions,
            search_query: search_query.into(),
            throttle,
        }
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(Error::config("at least one repository is required"));
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }
}
