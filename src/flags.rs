use std::collections::HashMap;

use tracing::debug;

use crate::{
    actions::Action,
    error::{Error, Result},
    query::compose,
    registry::Registry,
};

/// The value a filter flag was given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Enabled,
    Value(String),
    Values(Vec<String>),
}

/// Filter and action flags the user turned on, independent of how they
/// were parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSelection {
    pub filters: HashMap<String, FlagValue>,
    pub actions: Vec<String>,
    pub comments: Vec<String>,
}

impl FlagSelection {
    pub fn enable(mut self, flag: &str) -> Self {
        self.filters.insert(flag.to_string(), FlagValue::Enabled);
        self
    }

    pub fn value(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.filters
            .insert(flag.to_string(), FlagValue::Value(value.into()));
        self
    }

    pub fn values<I, S>(mut self, flag: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.insert(
            flag.to_string(),
            FlagValue::Values(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn action(mut self, flag: &str) -> Self {
        self.actions.push(flag.to_string());
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comments.push(text.into());
        self
    }
}

/// Composes the run query from every enabled filter flag.
///
/// Fragments are joined in registry order. The search backend treats
/// the clauses as an unordered conjunction, so the order only matters
/// for reproducible output.
pub fn resolve_query(registry: &Registry, selection: &FlagSelection) -> Result<String> {
    if let Some(unknown) = selection
        .filters
        .keys()
        .find(|flag| registry.template(flag).is_none())
    {
        return Err(Error::config(format!("unknown filter flag '--{unknown}'")));
    }

    let mut fragments = Vec::new();

    for template in registry.templates() {
        let Some(flag_value) = selection.filters.get(&template.flag) else {
            continue;
        };

        let fragment = match flag_value {
            FlagValue::Enabled => compose(template, "", &[])?,
            FlagValue::Value(value) if value.is_empty() => continue,
            FlagValue::Value(value) => compose(template, value, &[])?,
            FlagValue::Values(values) if values.is_empty() => continue,
            FlagValue::Values(values) => compose(template, "", values)?,
        };

        if !fragment.is_empty() {
            debug!(flag = %template.flag, %fragment, "Composed filter");
            fragments.push(fragment);
        }
    }

    Ok(fragments.join(" "))
}

/// Resolves enabled action flags and custom comments into actions.
///
/// Registry actions come first in registry order, followed by custom
/// comments in the order given.
pub fn resolve_actions(registry: &Registry, selection: &FlagSelection) -> Result<Vec<Action>> {
    if let Some(unknown) = selection
        .actions
        .iter()
        .find(|flag| registry.action(flag).is_none())
    {
        return Err(Error::config(format!("unknown action flag '--{unknown}'")));
    }

    let mut actions: Vec<Action> = registry
        .actions()
        .iter()
        .filter(|definition| selection.actions.contains(&definition.flag))
        .map(|definition| definition.to_action())
        .collect();

    for comment in &selection.comments {
        if comment.trim().is_empty() {
            return Err(Error::config("custom comment must not be empty"));
        }
        actions.push(Action::comment(comment.clone()));
    }

    for action in &actions {
        action.validate()?;
    }

    Ok(actions)
}
