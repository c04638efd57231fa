//! sjp - render HTML pages from Jinja templates.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod context;
mod preflight;

use commands::render::RenderArgs;
use preflight::PreflightError;

#[derive(Parser)]
#[command(name = "sjp")]
#[command(about = "Render HTML pages from Jinja templates")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    render: RenderArgs,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Exit code for a failed run. Failures past the source checks exit with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PreflightError>()
        .map(PreflightError::exit_code)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match commands::render::run(cli.render).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
