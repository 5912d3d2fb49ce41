//! Command-line definitions. Kept free of crate-internal imports so
//! `build.rs` can include it for man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Correlate smart-lock polls with camera frames and raise burglar alerts.
#[derive(Debug, Parser)]
#[command(
    name = "doorwatch",
    version,
    about = "Correlate smart-lock state with camera frames and raise burglar alerts",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "DOORWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "DOORWATCH_LOG_JSON", global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline over the poll and camera inboxes
    Run(RunArgs),

    /// Validate the configuration and print a summary
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Process whatever is in the inboxes, then exit
    #[arg(long)]
    pub once: bool,

    /// Override `paths.poll_inbox`
    #[arg(long, value_name = "DIR")]
    pub poll_inbox: Option<PathBuf>,

    /// Override `paths.camera_inbox`
    #[arg(long, value_name = "DIR")]
    pub camera_inbox: Option<PathBuf>,

    /// Override `paths.outbox`
    #[arg(long, value_name = "DIR")]
    pub outbox: Option<PathBuf>,

    /// Override `paths.state_dir`
    #[arg(long, value_name = "DIR", conflicts_with = "ephemeral")]
    pub state_dir: Option<PathBuf>,

    /// Keep gate and dedup state in memory only; nothing survives exit
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Also print the effective configuration as TOML
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
