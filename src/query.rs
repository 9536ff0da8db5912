use serde::Deserialize;

use crate::{
    error::{Error, Result},
    registry::Source,
    types::Repo,
};

const VALUE_PLACEHOLDER: &str = "{value}";
const LABELS_PLACEHOLDER: &str = "{labels}";

/// A named, possibly parameterized fragment of search syntax bound to a
/// command-line flag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryTemplate {
    pub name: String,
    pub flag: String,
    #[serde(default)]
    pub flag_short: Option<String>,
    pub description: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub query_template: Option<String>,
    #[serde(default)]
    pub parameterized: bool,
    #[serde(default)]
    pub supports_multiple: bool,
    #[serde(skip)]
    pub source: Source,
}

impl QueryTemplate {
    /// A fixed, non-parameterized template.
    pub fn fixed(flag: &str, description: &str, query: &str) -> Self {
        Self {
            name: flag.to_string(),
            flag: flag.to_string(),
            flag_short: None,
            description: description.to_string(),
            query: Some(query.to_string()),
            query_template: None,
            parameterized: false,
            supports_multiple: false,
            source: Source::Embedded,
        }
    }

    /// A parameterized template taking one value, or a list of values
    /// when `supports_multiple` is set.
    pub fn parameterized(
        flag: &str,
        description: &str,
        query_template: &str,
        supports_multiple: bool,
    ) -> Self {
        Self {
            name: flag.to_string(),
            flag: flag.to_string(),
            flag_short: None,
            description: description.to_string(),
            query: None,
            query_template: Some(query_template.to_string()),
            parameterized: true,
            supports_multiple,
            source: Source::Embedded,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::config(format!("template '{}': {reason}", self.flag)));

        if self.name.is_empty() {
            return invalid("name is required");
        }
        if self.flag.is_empty() {
            return invalid("flag is required");
        }
        if self.description.is_empty() {
            return invalid("description is required");
        }

        let has_query = self.query.as_deref().is_some_and(|q| !q.is_empty());
        let has_template = self
            .query_template
            .as_deref()
            .is_some_and(|q| !q.is_empty());

        match (has_query, has_template) {
            (false, false) => return invalid("either query or query_template is required"),
            (true, true) => return invalid("only one of query or query_template may be set"),
            _ => {}
        }
        if self.parameterized && !has_template {
            return invalid("parameterized templates must have query_template");
        }
        if self.supports_multiple && !self.parameterized {
            return invalid("supports_multiple requires a parameterized template");
        }
        if self.flag.starts_with('-') || self.flag.chars().any(char::is_whitespace) {
            return invalid("flag must not start with '-' or contain whitespace");
        }
        if let Some(short) = &self.flag_short
            && (short.len() != 1 || !short.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return invalid("flag_short must be a single ASCII letter or digit");
        }

        Ok(())
    }
}

/// Composes the search fragment for one template.
///
/// Fixed templates return their query verbatim. Parameterized templates
/// substitute `{value}` with the raw value and `{labels}` with one
/// `label:` or `-label:` term per entry of `values`. Values are trusted
/// and are not escaped or trimmed.
pub fn compose(template: &QueryTemplate, value: &str, values: &[String]) -> Result<String> {
    if !template.parameterized {
        return Ok(template.query.clone().unwrap_or_default());
    }

    let body = template
        .query_template
        .as_deref()
        .filter(|body| !body.is_empty())
        .ok_or_else(|| {
            Error::config(format!(
                "parameterized template '{}' is missing query_template",
                template.flag
            ))
        })?;

    let mut query = body.replace(VALUE_PLACEHOLDER, value);

    if query.contains(LABELS_PLACEHOLDER) {
        query = query.replace(LABELS_PLACEHOLDER, &label_terms(values));
    }

    Ok(query)
}

fn label_terms(values: &[String]) -> String {
    values
        .iter()
        .map(|label| match label.strip_prefix('-') {
            Some(negated) => format!("-label:{negated}"),
            None => format!("label:{label}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds search query strings from individual clauses.
#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(mut self, repo: &Repo) -> Self {
        self.terms.push(format!("repo:{repo}"));
        self
    }

    pub fn pr_type(mut self) -> Self {
        self.terms.push("type:pr".to_string());
        self
    }

    pub fn open(mut self) -> Self {
        self.terms.push("state:open".to_string());
        self
    }

    /// Appends a raw clause; empty clauses are ignored.
    pub fn term(mut self, term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() {
            self.terms.push(term.to_string());
        }
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

/// The search string run against one repository: open pull requests in
/// that repository, narrowed by the composed filter query.
pub fn repository_query(repo: &Repo, query: &str) -> String {
    SearchQueryBuilder::new()
        .repo(repo)
        .pr_type()
        .open()
        .term(query)
        .build()
}
