mod binding;
mod config;
mod error;
mod log_level;
mod logging_config;
mod probe_config;
mod recovery_config;
mod service_config;

pub use binding::Binding;
pub use config::Config;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use probe_config::{ProbeConfig, ResourceProbeConfig};
pub use recovery_config::RecoveryConfig;
pub use service_config::ServiceConfig;

#[cfg(test)]
mod tests;

const CONFIG_DIR_ENV: &str = "WARDEN_CONFIG_DIR";
const DEFAULT_CONFIG_DIR: &str = ".warden";
const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_COMMAND: &str = "ollama";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 11434;
const DEFAULT_PARALLELISM: u16 = 1;
const DEFAULT_HOST_ENV: &str = "OLLAMA_HOST";
const DEFAULT_MODEL_DIR_ENV: &str = "OLLAMA_MODELS";

const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "log";
