//! Vergate CLI - inspect server versions and preview request adaptation
//!
//! Thin front-end over vergate-core: detect the live revision, dump the
//! feature matrix, and show how a logical operation maps onto a given
//! version without sending it.

mod cli;
mod handlers;

use std::process;

use cli::{Cli, Commands};
use colored::{control, Colorize};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.no_color {
        control::set_override(false);
    }
    init_tracing(cli.verbose);

    let result = run(&cli).await;
    if let Err(error) = result {
        eprintln!("{} {:#}", "error:".red().bold(), error);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    tracing::debug!(base_url = %cli.base_url, command = ?cli.command, "executing command");
    match &cli.command {
        Commands::Detect => handlers::handle_detect(cli).await,
        Commands::Features { at } => handlers::handle_features(cli, at).await,
        Commands::Resolve { operation, at } => handlers::handle_resolve(cli, operation, at).await,
        Commands::Adapt {
            operation,
            params,
            at,
        } => handlers::handle_adapt(cli, operation, params, at).await,
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
