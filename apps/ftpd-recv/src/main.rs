//! Receives a single STOR/APPE upload into a directory.
//!
//! Replies are written to stdout as control-connection lines; logs go to
//! stderr.

mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ftpd_protocol::TransferMode;
use ftpd_upload::TransferOutcome;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ftpd-recv", about = "Receive one STOR/APPE upload over a passive data connection")]
struct Args {
    /// Upload directive: STOR or APPE
    #[arg(value_parser = parse_directive)]
    directive: TransferMode,
    /// Target path, relative to the upload root
    path: String,
    /// Restart offset, as set by REST
    #[arg(long, default_value_t = 0)]
    rest: u64,
    /// Path to the configuration file (TOML). Defaults to ~/.config/ftpd/recv.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Upload root (overrides config file)
    #[arg(long)]
    root: Option<PathBuf>,
}

fn parse_directive(s: &str) -> Result<TransferMode, String> {
    TransferMode::from_directive(s).ok_or_else(|| format!("unknown directive {s:?}, expected STOR or APPE"))
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(root) = args.root {
        config.root = root;
    }

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(app::run(config, args.directive, args.path, args.rest))?;

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &TransferOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        tracing::warn!(?outcome, "upload did not complete");
        ExitCode::FAILURE
    }
}
