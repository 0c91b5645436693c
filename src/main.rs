use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod applier;
mod cli;
mod config;
mod exec;
mod manual;
mod policy;

use applier::Applier;
use cli::RootArgs;
use config::Settings;

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let settings = Settings {
        policy_path: args.policy,
        ..Settings::default()
    };
    let applier = Applier::new(settings);
    tracing::debug!(
        bucket = %applier.settings().bucket,
        policy = %applier.settings().policy_path.display(),
        "starting"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = applier.run(&mut out).context("write to stdout")?;
    out.flush().context("flush stdout")?;

    tracing::debug!(?outcome, "finished");
    Ok(ExitCode::from(&outcome))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
