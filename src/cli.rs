use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cairn")]
#[command(version)]
#[command(about = "Declarative state management for Alpine Linux", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the desired-state document
    #[arg(long, global = true, default_value = "./system.yaml")]
    pub config: String,

    /// Log level (debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview the plan that would converge the system
    Diff(DiffArgs),

    /// Apply the plan, rolling back on the first failure
    Apply(ApplyArgs),

    /// Print the current system state
    Dump(DumpArgs),
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Output the plan in JSON format
    #[arg(long)]
    pub json: bool,

    /// Include deletion of unmanaged files in the plan
    #[arg(long)]
    pub prune_unmanaged: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Show what would change without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output the plan in JSON format (only with --dry-run)
    #[arg(long)]
    pub json: bool,

    /// Delete unmanaged files not present in the configuration
    #[arg(long)]
    pub prune_unmanaged: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct DumpArgs {
    /// Output the state in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show files that are ignored, with reasons
    #[arg(long)]
    pub show_ignored: bool,

    /// Preview which files would be ignored by the given config file
    #[arg(long)]
    pub preview_ignores: Option<String>,

    /// Suppress the ignored-file report entirely (use with caution)
    #[arg(long)]
    pub raw: bool,

    /// Show all services, including those not enabled in any runlevel
    #[arg(long)]
    pub all_services: bool,
}
