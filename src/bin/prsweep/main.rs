mod display;

use anyhow::Context;
use display::display_prs;
use prsweep::{GitHub, Registry, output_commands, parse_args, run};
use tokio_util::sync::CancellationToken;
use tracing::warn;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Logging has to be up before the registry loads, so --debug is
    // picked out ahead of full argument parsing.
    init_tracing(args.iter().skip(1).any(|arg| arg == "--debug"));

    let registry = Registry::load().context("Failed to load template and action registry")?;

    let (config, display_mode) = match parse_args(args, &registry) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let github = GitHub::connect().await?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c_token.cancel();
        }
    });

    let result = run(&config, &github, &cancel).await?;
    let mut stdout = std::io::stdout().lock();

    if config.has_actions() {
        output_commands(&result.tasks, &mut stdout)?;
    } else {
        display_prs(&result.repositories, display_mode, &mut stdout)?;
    }

    Ok(())
}
