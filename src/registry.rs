//! Filter templates and comment actions that become command-line flags.
//!
//! Definitions ship embedded in the binary and may be extended or
//! overridden by the user's `templates.toml` and `actions.toml` in the
//! prsweep config directory. The registry is built once at startup and
//! is read-only afterwards.

use std::{
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    actions::{Action, LabelPredicate},
    error::{Error, Result},
    query::QueryTemplate,
};

const EMBEDDED_TEMPLATES: &str = include_str!("registry/templates.toml");
const EMBEDDED_ACTIONS: &str = include_str!("registry/actions.toml");

const APP_NAME: &str = "prsweep";

/// Flags owned by the command line itself.
const RESERVED_FLAGS: &[&str] = &["repo", "comment", "throttle", "quiet", "debug", "help", "version"];
const RESERVED_SHORTS: &[&str] = &["r", "c", "q", "h", "V"];

/// Where a definition came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Source {
    #[default]
    Embedded,
    User,
}

/// A comment action as declared in a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    pub flag: String,
    pub description: String,
    pub comment: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub predicate: LabelPredicate,
    #[serde(skip)]
    pub source: Source,
}

impl ActionDefinition {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::config(format!("action '{}': {reason}", self.flag)));

        if self.name.is_empty() {
            return invalid("name is required");
        }
        if self.flag.is_empty() {
            return invalid("flag is required");
        }
        if self.description.is_empty() {
            return invalid("description is required");
        }
        if self.comment.is_empty() {
            return invalid("comment is required");
        }

        self.to_action().validate()
    }

    pub fn to_action(&self) -> Action {
        Action {
            comment: self.comment.clone(),
            label: self.label.clone(),
            predicate: self.predicate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    template: Vec<QueryTemplate>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionFile {
    #[serde(default)]
    action: Vec<ActionDefinition>,
}

/// Ordered, read-only collection of filter templates and actions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    templates: Vec<QueryTemplate>,
    actions: Vec<ActionDefinition>,
}

impl Registry {
    /// The definitions compiled into the binary.
    pub fn embedded() -> Result<Self> {
        let mut registry = Self::default();
        registry.merge_templates(EMBEDDED_TEMPLATES, Source::Embedded)?;
        registry.merge_actions(EMBEDDED_ACTIONS, Source::Embedded)?;
        Ok(registry)
    }

    /// Embedded definitions overlaid with the user's registry files.
    ///
    /// A broken user file is reported and skipped; the embedded
    /// definitions are always available.
    pub fn load() -> Result<Self> {
        let mut registry = Self::embedded()?;
        if let Some(dir) = user_config_dir() {
            registry.merge_user_dir(&dir);
        }
        Ok(registry)
    }

    pub fn merge_user_dir(&mut self, dir: &Path) {
        let templates_path = dir.join("templates.toml");
        match read_optional(&templates_path) {
            Ok(Some(text)) => {
                if let Err(e) = self.merge_templates(&text, Source::User) {
                    warn!(path = %templates_path.display(), error = %e, "Ignoring user templates");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %templates_path.display(), error = %e, "Failed to read user templates")
            }
        }

        let actions_path = dir.join("actions.toml");
        match read_optional(&actions_path) {
            Ok(Some(text)) => {
                if let Err(e) = self.merge_actions(&text, Source::User) {
                    warn!(path = %actions_path.display(), error = %e, "Ignoring user actions");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %actions_path.display(), error = %e, "Failed to read user actions")
            }
        }
    }

    /// Merges templates from TOML text. Entries replace existing ones
    /// with the same flag in place; new flags are appended. Nothing is
    /// merged if any entry is invalid.
    pub fn merge_templates(&mut self, text: &str, source: Source) -> Result<()> {
        let file: TemplateFile = toml::from_str(text)
            .map_err(|e| Error::config(format!("failed to parse templates: {e}")))?;

        let mut templates = self.templates.clone();
        for mut template in file.template {
            template.validate()?;
            check_flag(
                &template.flag,
                template.flag_short.as_deref(),
                FlagKind::Template,
                &templates,
                &self.actions,
            )?;
            template.source = source;

            debug!(flag = %template.flag, ?source, "Registered template");
            match templates.iter_mut().find(|t| t.flag == template.flag) {
                Some(existing) => *existing = template,
                None => templates.push(template),
            }
        }

        self.templates = templates;
        Ok(())
    }

    /// Merges actions from TOML text with the same rules as
    /// [`Registry::merge_templates`].
    pub fn merge_actions(&mut self, text: &str, source: Source) -> Result<()> {
        let file: ActionFile = toml::from_str(text)
            .map_err(|e| Error::config(format!("failed to parse actions: {e}")))?;

        let mut actions = self.actions.clone();
        for mut action in file.action {
            action.validate()?;
            check_flag(&action.flag, None, FlagKind::Action, &self.templates, &actions)?;
            action.source = source;

            debug!(flag = %action.flag, ?source, "Registered action");
            match actions.iter_mut().find(|a| a.flag == action.flag) {
                Some(existing) => *existing = action,
                None => actions.push(action),
            }
        }

        self.actions = actions;
        Ok(())
    }

    pub fn templates(&self) -> &[QueryTemplate] {
        &self.templates
    }

    pub fn template(&self, flag: &str) -> Option<&QueryTemplate> {
        self.templates.iter().find(|t| t.flag == flag)
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn action(&self, flag: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.flag == flag)
    }
}

#[derive(Debug, Clone, Copy)]
enum FlagKind {
    Template,
    Action,
}

/// Rejects flags the command line could not register: malformed text,
/// reserved names, shorts already taken and names used by the other
/// kind. `templates` and `actions` are the lists being built, so clashes
/// within a single file are caught too.
fn check_flag(
    flag: &str,
    short: Option<&str>,
    kind: FlagKind,
    templates: &[QueryTemplate],
    actions: &[ActionDefinition],
) -> Result<()> {
    if flag.is_empty() || flag.starts_with('-') || flag.chars().any(char::is_whitespace) {
        return Err(Error::config(format!("invalid flag name '{flag}'")));
    }
    if RESERVED_FLAGS.contains(&flag) {
        return Err(Error::config(format!("flag '--{flag}' is reserved")));
    }

    if let Some(short) = short {
        if short.len() != 1 || !short.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::config(format!(
                "short flag '{short}' for '--{flag}' must be a single ASCII letter or digit"
            )));
        }
        if RESERVED_SHORTS.contains(&short) {
            return Err(Error::config(format!("short flag '-{short}' is reserved")));
        }
        let taken = templates
            .iter()
            .any(|t| t.flag != flag && t.flag_short.as_deref() == Some(short));
        if taken {
            return Err(Error::config(format!("short flag '-{short}' is already in use")));
        }
    }

    let clashes = match kind {
        FlagKind::Template => actions.iter().any(|a| a.flag == flag),
        FlagKind::Action => templates.iter().any(|t| t.flag == flag),
    };
    if clashes {
        return Err(Error::config(format!(
            "flag '--{flag}' is defined as both a filter and an action"
        )));
    }

    Ok(())
}

/// `~/.config/prsweep` on Linux, the platform equivalent elsewhere.
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_NAME))
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
