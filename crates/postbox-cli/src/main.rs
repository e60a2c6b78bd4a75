use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;

mod cli_args;
mod cli_command;
mod modules;

use crate::cli_args::*;
use crate::cli_command::handle_command;
use crate::modules::system::{resolve_config_dir, CommandContext};
use postbox_core::redact_secrets;
use tracing_subscriber::EnvFilter;

pub(crate) const REFRESH_SKEW_SECONDS: i64 = 30;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose) {
        eprintln!("error: failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", redact_secrets(&format!("{err:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_dir = resolve_config_dir(cli.config_dir)?;
    tracing::debug!(
        config_dir = %config_dir.display(),
        backend = %cli.secret_backend,
        "starting"
    );
    let ctx = CommandContext::open(config_dir, cli.secret_backend, cli.profile.as_deref())?;
    handle_command(cli.command, &ctx).await
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

pub(crate) fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    let mut input = String::new();
    print!("{prompt}");
    io::stdout().flush()?;
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
