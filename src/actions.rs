use serde::Deserialize;

use crate::error::{Error, Result};

/// Label-based gate deciding whether an action fires for a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPredicate {
    #[default]
    None,
    /// Do not fire when the label is already present ("act once").
    SkipIfLabelExists,
    /// Fire only when the label is present (eligibility marker).
    OnlyIfLabelExists,
}

/// A candidate comment to post on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub comment: String,
    pub label: Option<String>,
    pub predicate: LabelPredicate,
}

impl Action {
    /// An ungated comment, as produced by `--comment`.
    pub fn comment(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            label: None,
            predicate: LabelPredicate::None,
        }
    }

    pub fn gated(
        comment: impl Into<String>,
        label: impl Into<String>,
        predicate: LabelPredicate,
    ) -> Self {
        Self {
            comment: comment.into(),
            label: Some(label.into()),
            predicate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.predicate != LabelPredicate::None
            && self.label.as_deref().is_none_or(str::is_empty)
        {
            return Err(Error::config(format!(
                "action '{}' has a label predicate but no label",
                self.comment
            )));
        }
        Ok(())
    }

    /// Decides whether this action fires given a pull request's labels.
    pub fn applies_to(&self, labels: &[String]) -> bool {
        let has_label = || {
            self.label
                .as_deref()
                .is_some_and(|label| labels.iter().any(|l| l == label))
        };

        match self.predicate {
            LabelPredicate::None => true,
            LabelPredicate::SkipIfLabelExists => !has_label(),
            LabelPredicate::OnlyIfLabelExists => has_label(),
        }
    }
}

/// Returns the actions that should fire for a pull request with the given
/// labels, preserving input order.
pub fn applicable_actions<'a>(actions: &'a [Action], labels: &[String]) -> Vec<&'a Action> {
    actions
        .iter()
        .filter(|action| action.applies_to(labels))
        .collect()
}
