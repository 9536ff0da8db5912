use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::{Arg, ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::debug;

use crate::{
    config::{Config, DisplayMode},
    flags::{FlagSelection, resolve_actions, resolve_query},
    registry::Registry,
    throttle::parse_throttle_duration,
    types::{PullRequestRef, Repo},
};

const FILTER_ID_PREFIX: &str = "filter:";
const ACTION_ID_PREFIX: &str = "action:";

/// Arguments that exist regardless of which templates and actions are
/// registered. Filter and action flags are added at runtime from the
/// registry.
#[derive(Parser, Default, Debug)]
#[command(
    name = "prsweep",
    version,
    about = "Find GitHub PRs across repositories and generate bulk comment commands (approve, LGTM, retest, etc.)"
)]
struct CliArgs {
    /// GitHub repository in format 'owner/repo' (can specify multiple; required when using numeric PR arguments or no PR arguments)
    #[arg(short = 'r', long = "repo", value_name = "OWNER/REPO")]
    pub repo: Vec<String>,

    /// PR-NUMBER|PR-URL ...
    pub prs: Vec<String>,

    /// Post custom comment commands (can specify multiple)
    #[arg(short = 'c', long, value_name = "TEXT")]
    pub comment: Vec<String>,

    /// Skip if same comment posted recently (e.g. 5, 30s, 5m, 2h; unitless implies minutes)
    #[arg(long, value_name = "DURATION")]
    pub throttle: Option<String>,

    /// Print PR numbers only
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

fn filter_id(flag: &str) -> String {
    format!("{FILTER_ID_PREFIX}{flag}")
}

fn action_id(flag: &str) -> String {
    format!("{ACTION_ID_PREFIX}{flag}")
}

/// Builds the full command: the static arguments plus one flag per
/// registered template and action.
pub fn build_command(registry: &Registry) -> clap::Command {
    let mut command = CliArgs::command();

    for template in registry.templates() {
        let mut arg = Arg::new(filter_id(&template.flag))
            .long(template.flag.clone())
            .help(template.description.clone())
            .help_heading("Filters");

        if let Some(short) = template.flag_short.as_deref().and_then(|s| s.chars().next()) {
            arg = arg.short(short);
        }

        arg = if template.supports_multiple {
            arg.action(ArgAction::Append)
                .value_delimiter(',')
                .allow_hyphen_values(true)
                .value_name("VALUE")
        } else if template.parameterized {
            arg.action(ArgAction::Set)
                .allow_hyphen_values(true)
                .value_name("VALUE")
        } else {
            arg.action(ArgAction::SetTrue)
        };

        command = command.arg(arg);
    }

    for definition in registry.actions() {
        command = command.arg(
            Arg::new(action_id(&definition.flag))
                .long(definition.flag.clone())
                .help(definition.description.clone())
                .help_heading("Actions")
                .action(ArgAction::SetTrue),
        );
    }

    command
}

/// Whether `arg` is `--comment` or a short cluster ending in `c`
/// (`-c`, `-qc`), so the next argument is a comment body.
fn takes_comment_value(arg: &str) -> bool {
    if arg == "--comment" {
        return true;
    }
    match arg.strip_prefix('-') {
        Some(cluster) if !cluster.starts_with('-') => {
            cluster.ends_with('c') && cluster.chars().all(|c| c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Rewrites bare slash commands such as `/approve` into their flag
/// form, for every registered action. The value of `-c`/`--comment` is
/// left alone.
fn transform_slash_commands(args: Vec<String>, registry: &Registry) -> Vec<String> {
    let mut transformed = Vec::with_capacity(args.len());
    let mut previous_was_comment = false;

    for arg in args {
        let is_comment_flag = takes_comment_value(&arg);

        let rewritten = match arg.strip_prefix('/') {
            Some(flag) if !previous_was_comment && registry.action(flag).is_some() => {
                format!("--{flag}")
            }
            _ => arg,
        };

        previous_was_comment = is_comment_flag;
        transformed.push(rewritten);
    }

    transformed
}

fn flag_selection(matches: &ArgMatches, registry: &Registry) -> FlagSelection {
    let mut selection = FlagSelection::default();

    for template in registry.templates() {
        let id = filter_id(&template.flag);
        if template.supports_multiple {
            if let Some(values) = matches.get_many::<String>(&id) {
                selection = selection.values(&template.flag, values.cloned());
            }
        } else if template.parameterized {
            if let Some(value) = matches.get_one::<String>(&id) {
                selection = selection.value(&template.flag, value.clone());
            }
        } else if matches.get_flag(&id) {
            selection = selection.enable(&template.flag);
        }
    }

    for definition in registry.actions() {
        if matches.get_flag(&action_id(&definition.flag)) {
            selection = selection.action(&definition.flag);
        }
    }

    selection
}

fn determine_display_mode(cli: &CliArgs) -> DisplayMode {
    if cli.quiet {
        DisplayMode::Quiet
    } else {
        DisplayMode::Normal
    }
}

fn parse_pr_refs(prs: &[String]) -> Result<Vec<PullRequestRef>> {
    prs.iter()
        .map(|pr| pr.trim())
        .filter(|pr| !pr.is_empty())
        .map(|pr| PullRequestRef::parse(pr).map_err(anyhow::Error::from))
        .collect()
}

fn collect_repositories(cli: &CliArgs, refs: &[PullRequestRef]) -> Result<Vec<Repo>> {
    let needs_repo = refs.is_empty() || refs.iter().any(|r| r.repo.is_none());
    if needs_repo && cli.repo.is_empty() {
        anyhow::bail!("--repo is required when using numeric PR arguments or no PR arguments");
    }

    let mut repositories = cli
        .repo
        .iter()
        .map(|r| Repo::parse(r).with_context(|| format!("Invalid repository format '{r}'")))
        .collect::<Result<Vec<_>>>()?;

    repositories.extend(refs.iter().filter_map(|r| r.repo.clone()));
    Ok(repositories)
}

fn create_config(cli: &CliArgs, selection: &FlagSelection, registry: &Registry) -> Result<Config> {
    let parsed_prs = parse_pr_refs(&cli.prs)?;
    let repositories = collect_repositories(cli, &parsed_prs)?;

    let search_query = resolve_query(registry, selection)?;
    let actions = resolve_actions(registry, selection)?;

    let throttle = cli
        .throttle
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(parse_throttle_duration)
        .transpose()?
        .unwrap_or(TimeDelta::zero());

    let config = Config::new(repositories, parsed_prs, actions, search_query, throttle);
    config.validate()?;

    debug!(
        repositories = config.repositories.len(),
        refs = config.parsed_prs.len(),
        actions = config.actions.len(),
        query = %config.search_query,
        "Built run configuration"
    );

    Ok(config)
}

/// Parses command-line arguments into a run configuration and display
/// mode.
///
/// Slash commands (e.g. `/retest`) are rewritten to flags first. Filter
/// and action flags come from `registry`.
pub fn parse_args<I, T>(args: I, registry: &Registry) -> Result<(Config, DisplayMode)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args_vec = args
        .into_iter()
        .map(|arg| {
            arg.into()
                .into_string()
                .map_err(|arg| anyhow::anyhow!("Argument is not valid UTF-8: {arg:?}"))
        })
        .collect::<Result<Vec<String>>>()?;
    let transformed_args = transform_slash_commands(args_vec, registry);

    let matches = build_command(registry).try_get_matches_from(transformed_args)?;
    let cli = CliArgs::from_arg_matches(&matches)?;
    let mut selection = flag_selection(&matches, registry);
    selection.comments = cli.comment.clone();

    let config = create_config(&cli, &selection, registry)?;
    Ok((config, determine_display_mode(&cli)))
}
