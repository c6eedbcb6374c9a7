//! warden - liveness supervisor for model-serving processes
//!
//! ```bash
//! # Supervise every configured binding
//! warden
//!
//! # Validate .warden/config.toml and list the bindings
//! warden check
//!
//! # Kill orphans left on the configured ports by a previous run
//! warden sweep --config-dir /etc/warden
//! ```

mod cli;
mod error;
mod logger;

#[cfg(test)]
mod tests;

use crate::{
    cli::{Cli, Command},
    error::Result as DaemonResult,
};

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use wd_config::Config;
use wd_supervisor::{ShutdownCoordinator, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("warden: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> DaemonResult<()> {
    // Load and validate configuration
    let config_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => Config::config_dir()?,
    };
    let config = Config::load_from(&config_dir)?;
    config.validate()?;

    let log_dir = config.log_dir(&config_dir);

    match cli.action() {
        Command::Check => {
            print_bindings(&config, &config_dir, &log_dir);
            Ok(())
        }
        Command::Sweep => {
            let _guard = logger::initialize(&config.logging, &log_dir)?;
            info!("Sweeping {} binding(s)", config.bindings().len());
            Supervisor::sweep(&config).await?;
            info!("Sweep complete");
            Ok(())
        }
        Command::Run => {
            // Initialize logger (before any other logging)
            let _guard = logger::initialize(&config.logging, &log_dir)?;

            info!("Starting warden v{}", env!("CARGO_PKG_VERSION"));
            config.log_summary();

            let shutdown = ShutdownCoordinator::new();
            spawn_signal_handler(shutdown.clone());

            let supervisor = Supervisor::from_config(&config, &log_dir)?;
            supervisor.run(&shutdown).await?;

            info!("All supervision loops stopped");
            Ok(())
        }
    }
}

fn print_bindings(config: &Config, config_dir: &Path, log_dir: &Path) {
    println!("config: {}", config_dir.display());
    println!(
        "service: {} {}",
        config.service.command,
        config.service.args.join(" ")
    );
    for binding in config.bindings() {
        println!(
            "  {binding} -> {}",
            log_dir.join(format!("serve-{}.log", binding.port)).display()
        );
    }
}

/// SIGINT/SIGTERM start the graceful shutdown; a second signal exits at once.
#[cfg(unix)]
fn spawn_signal_handler(shutdown: ShutdownCoordinator) {
    std::thread::spawn(move || {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register signal handlers: {e}");
                return;
            }
        };

        for sig in signals.forever() {
            if shutdown.is_shutdown() {
                warn!("Received signal {sig} during shutdown, exiting immediately");
                std::process::exit(128 + sig);
            }

            info!("Received signal {sig}, stopping supervised processes...");
            shutdown.shutdown();
        }
    });
}

#[cfg(not(unix))]
fn spawn_signal_handler(shutdown: ShutdownCoordinator) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping supervised processes...");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    });
}
