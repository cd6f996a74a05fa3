//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Appwall - per-application firewall gateway
#[derive(Parser, Debug)]
#[command(
    name = "appwall",
    author,
    version,
    about = "Per-application firewall via a capture-and-drop virtual interface",
    long_about = r#"
Appwall blocks selected applications from reaching the internet by owning
a virtual network interface with a restricted capture allow-list: traffic
from blocked applications is routed into the interface and silently
dropped, while everything else bypasses it entirely.

QUICK START:
  Block an app:   appwall block com.example.app
  Run the gateway: sudo appwall run
  Inspect:        appwall list
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interception gateway until interrupted
    Run(RunArgs),

    /// Add an application to the block list
    Block(AppArgs),

    /// Remove an application from the block list
    Unblock(AppArgs),

    /// Show the current block list
    List,

    /// Show example configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session label for the virtual interface
    #[arg(long)]
    pub session: Option<String>,
}

#[derive(Args, Debug)]
pub struct AppArgs {
    /// Application identity (e.g. com.example.app)
    pub app: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the example configuration to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
