//! Command-line argument definitions

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vergate",
    version,
    about = "Detect a server's API revision and preview how requests adapt to it"
)]
pub struct Cli {
    /// Base URL of the target server
    #[arg(long, env = "VERGATE_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Replace the built-in rule table with a JSON file
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect the live server version via the diagnostic endpoint
    Detect,
    /// Show the feature matrix against a version (detected unless --at is given)
    Features {
        /// Evaluate against this version instead of detecting
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },
    /// Resolve the concrete endpoint for a logical operation
    Resolve {
        /// Logical operation identifier, e.g. get_tracked_entities
        operation: String,
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },
    /// Preview the fully adapted request for a logical operation
    Adapt {
        operation: String,
        /// Canonical parameter as KEY=VALUE, repeatable
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
