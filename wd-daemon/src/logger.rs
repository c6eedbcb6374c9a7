//! Logging setup with file rotation.

use crate::error::{DaemonError, Result as DaemonResult};

use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt};
use wd_config::{LogLevel, LoggingConfig};

const LOG_FILE_PREFIX: &str = "warden";
const LOG_FILE_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;

/// Dependencies that are noisy below `warn`.
const QUIET_TARGETS: [&str; 3] = ["hyper", "hyper_util", "reqwest"];

/// Setup logging with console and rotating file output.
///
/// # Log Layers
/// - Console: human-readable, ANSI colors per `logging.colored`
/// - File: plain text, daily rotation, 7 files retained
///
/// `RUST_LOG` wins over the configured level. `log` records (the config
/// crate) are bridged into tracing. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn initialize(logging: &LoggingConfig, log_dir: &Path) -> DaemonResult<WorkerGuard> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        DaemonError::logging(format!(
            "Failed to create log directory {}: {e}",
            log_dir.display()
        ))
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(log_dir)
        .map_err(|e| DaemonError::logging(format!("Failed to open rolling log: {e}")))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(logging.colored);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_writer);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(logging.level))
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DaemonError::logging(format!("Failed to initialize logger: {e}")))?;

    // Bridge log to tracing
    tracing_log::LogTracer::init()
        .map_err(|e| DaemonError::logging(format!("Failed to bridge log records: {e}")))?;

    info!(
        "Logger initialized: level={}, dir={}",
        logging.level.as_directive(),
        log_dir.display()
    );

    Ok(guard)
}

pub(crate) fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Configured level for our crates; quiet dependencies stay at `warn` or stricter.
pub(crate) fn default_directive(level: LogLevel) -> String {
    let level = level.as_directive();
    let quiet = if level == "off" || level == "error" {
        level.as_str()
    } else {
        "warn"
    };

    std::iter::once(level.clone())
        .chain(QUIET_TARGETS.iter().map(|target| format!("{target}={quiet}")))
        .collect::<Vec<_>>()
        .join(",")
}
