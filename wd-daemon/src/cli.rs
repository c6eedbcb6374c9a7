use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Keeps model-serving processes alive and responsive")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Command>,

    /// Config directory (default: $WARDEN_CONFIG_DIR, else ./.warden)
    #[arg(long, global = true)]
    pub(crate) config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Command {
    /// Supervise every configured binding until SIGINT/SIGTERM
    #[default]
    Run,

    /// Load and validate the config, then print the resolved bindings
    Check,

    /// Kill anything left on the configured bindings and exit
    Sweep,
}

impl Cli {
    pub(crate) fn action(&self) -> Command {
        self.command.unwrap_or_default()
    }
}
