use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_COMMAND, DEFAULT_HOST, DEFAULT_HOST_ENV,
    DEFAULT_MODEL_DIR_ENV, DEFAULT_PARALLELISM, DEFAULT_PORT,
};

use std::collections::BTreeMap;

use serde::Deserialize;

pub const MIN_PARALLELISM: u16 = 1;
pub const MAX_PARALLELISM: u16 = 64;

/// The model-serving binary and how to launch it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Binary name (resolved via PATH) or path
    pub command: String,
    pub args: Vec<String>,
    pub host: String,
    /// First port; parallel instances take the following ports
    pub port: u16,
    /// Number of concurrently supervised instances
    pub parallelism: u16,
    /// Model storage directory, exported through `model_dir_env`
    pub model_dir: Option<String>,
    /// Variable receiving `host:port` for each instance
    pub host_env: String,
    pub model_dir_env: String,
    pub working_dir: Option<String>,
    /// Extra `pgrep -f` pattern for processes to kill on teardown (`{host}`, `{port}` expanded)
    pub kill_pattern: Option<String>,
    /// Additional environment for the child
    pub env: BTreeMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: String::from(DEFAULT_COMMAND),
            args: vec![String::from("serve")],
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            parallelism: DEFAULT_PARALLELISM,
            model_dir: None,
            host_env: String::from(DEFAULT_HOST_ENV),
            model_dir_env: String::from(DEFAULT_MODEL_DIR_ENV),
            working_dir: None,
            kill_pattern: None,
            env: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::service("service.command must not be empty"));
        }

        if self.parallelism < MIN_PARALLELISM || self.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::service(format!(
                "service.parallelism must be {}-{}, got {}",
                MIN_PARALLELISM, MAX_PARALLELISM, self.parallelism
            )));
        }

        if self.port == 0 {
            return Err(ConfigError::service(
                "service.port must be a fixed port, got 0",
            ));
        }

        let last_port = u32::from(self.port) + u32::from(self.parallelism) - 1;
        if last_port > u32::from(u16::MAX) {
            return Err(ConfigError::service(format!(
                "service.port {} with parallelism {} exceeds port {}",
                self.port,
                self.parallelism,
                u16::MAX
            )));
        }

        if self.host_env.trim().is_empty() {
            return Err(ConfigError::service("service.host_env must not be empty"));
        }

        if let Some(pattern) = &self.kill_pattern
            && pattern.trim().is_empty()
        {
            return Err(ConfigError::service(
                "service.kill_pattern must not be blank when set",
            ));
        }

        Ok(())
    }
}
