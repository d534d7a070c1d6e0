use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wrtconf")]
#[command(version)]
#[command(about = "Declarative configuration for OpenWrt devices", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply configuration to all enabled devices
    Provision(ProvisionArgs),

    /// Print each device's command script without executing it
    #[command(visible_alias = "print")]
    PrintUciCommands(PrintArgs),

    /// Export configuration from a live device as a document
    ExportConfig(ExportArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ProvisionArgs {
    /// Path to the configuration document (JSON)
    pub config: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct PrintArgs {
    /// Path to the configuration document (JSON)
    pub config: PathBuf,

    /// Print resolved target state as JSON instead of commands
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Device IP address or hostname
    #[arg(long)]
    pub ip: String,

    /// Expected device model id (verified against the device)
    #[arg(long)]
    pub model: Option<String>,

    /// SSH username
    #[arg(long, default_value = "root")]
    pub user: String,

    /// SSH password (omit to use key-based auth)
    #[arg(long, env = "WRTCONF_SSH_PASSWORD")]
    pub pass: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
