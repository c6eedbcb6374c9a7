use crate::{
    Binding, CONFIG_DIR_ENV, CONFIG_FILENAME, ConfigError, ConfigErrorResult, DEFAULT_CONFIG_DIR,
    LoggingConfig, ProbeConfig, RecoveryConfig, ServiceConfig,
};

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    /// Explicit bindings; derived from `service.port` and `service.parallelism` when empty
    pub instances: Vec<Binding>,
    pub probe: ProbeConfig,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from the default config directory.
    ///
    /// Loading order:
    /// 1. Check for WARDEN_CONFIG_DIR env var, else use ./.warden/
    /// 2. Auto-create config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply WARDEN_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        let config_dir = Self::config_dir()?;
        Self::load_from(&config_dir)
    }

    /// Load config from an explicit directory (same order as `load`, minus discovery).
    pub fn load_from(config_dir: &Path) -> ConfigErrorResult<Self> {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.to_path_buf(),
                source: e,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load and parse TOML file with detailed error context.
    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: WARDEN_CONFIG_DIR env var > ./.warden/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(DEFAULT_CONFIG_DIR))
    }

    /// Validate all configuration.
    /// Call after load() so the supervisor never starts half-configured.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.service.validate()?;
        self.probe.validate()?;
        self.recovery.validate()?;

        if self.logging.dir.trim().is_empty() {
            return Err(ConfigError::logging("logging.dir must not be empty"));
        }

        let bindings = self.bindings();

        for binding in &bindings {
            if binding.port == 0 {
                return Err(ConfigError::binding(format!(
                    "instance {binding} must use a fixed port"
                )));
            }

            if binding.host.trim().is_empty() {
                return Err(ConfigError::binding(format!(
                    "instance on port {} has an empty host",
                    binding.port
                )));
            }
        }

        for (i, first) in bindings.iter().enumerate() {
            if let Some(second) = bindings[i + 1..].iter().find(|b| first.overlaps(b)) {
                return Err(ConfigError::binding(format!(
                    "bindings {first} and {second} overlap"
                )));
            }
        }

        Ok(())
    }

    /// Every binding to supervise, one loop each.
    pub fn bindings(&self) -> Vec<Binding> {
        if !self.instances.is_empty() {
            return self.instances.clone();
        }

        (0..self.service.parallelism)
            .filter_map(|offset| self.service.port.checked_add(offset))
            .map(|port| Binding::new(self.service.host.clone(), port))
            .collect()
    }

    /// Resolve the log directory against the config directory.
    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        let dir = Path::new(&self.logging.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            config_dir.join(dir)
        }
    }

    /// Log configuration summary.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  service: {} {} (host env {})",
            self.service.command,
            self.service.args.join(" "),
            self.service.host_env
        );

        let bindings = self
            .bindings()
            .iter()
            .map(Binding::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!("  bindings: [{bindings}]");

        if let Some(ref model_dir) = self.service.model_dir {
            info!("  models: {} ({})", model_dir, self.service.model_dir_env);
        }

        if let Some(ref pattern) = self.service.kill_pattern {
            info!("  kill pattern: {pattern}");
        }

        info!(
            "  probe: every {}s, timeout={}s, grace={}s, startup={} cycles",
            self.probe.interval_secs,
            self.probe.timeout_secs,
            self.probe.grace_delay_secs,
            self.probe.startup_grace_cycles
        );

        if self.probe.readiness {
            info!(
                "  readiness: GET {} expecting \"{}\"",
                self.probe.path, self.probe.marker
            );
        } else {
            info!("  readiness: disabled (existence only)");
        }

        if let Some(ref resource) = self.probe.resource {
            info!(
                "  resource probe: {} {}",
                resource.command,
                resource.args.join(" ")
            );
        }

        let cap = if self.recovery.max_restarts == 0 {
            String::from("unbounded")
        } else {
            self.recovery.max_restarts.to_string()
        };

        info!(
            "  recovery: backoff={}ms..{}ms x{}, kill timeout={}s, restarts={}",
            self.recovery.initial_backoff_ms,
            self.recovery.max_backoff_ms,
            self.recovery.backoff_multiplier,
            self.recovery.kill_timeout_secs,
            cap
        );

        info!(
            "  logging: {} in {} (colored: {})",
            *self.logging.level, self.logging.dir, self.logging.colored
        );
    }

    /// A set variable that does not parse is an error, never silently ignored.
    fn apply_env_overrides(&mut self) -> ConfigErrorResult<()> {
        // Service
        Self::apply_env_string("WARDEN_COMMAND", &mut self.service.command);
        Self::apply_env_string("WARDEN_HOST", &mut self.service.host);
        Self::apply_env_parse("WARDEN_PORT", &mut self.service.port)?;
        Self::apply_env_parse("WARDEN_PARALLELISM", &mut self.service.parallelism)?;
        Self::apply_env_option_string("WARDEN_MODEL_DIR", &mut self.service.model_dir);
        Self::apply_env_option_string("WARDEN_KILL_PATTERN", &mut self.service.kill_pattern);

        // Probe
        Self::apply_env_parse("WARDEN_PROBE_INTERVAL_SECS", &mut self.probe.interval_secs)?;
        Self::apply_env_parse("WARDEN_PROBE_TIMEOUT_SECS", &mut self.probe.timeout_secs)?;
        Self::apply_env_parse(
            "WARDEN_PROBE_GRACE_DELAY_SECS",
            &mut self.probe.grace_delay_secs,
        )?;
        Self::apply_env_parse(
            "WARDEN_STARTUP_GRACE_CYCLES",
            &mut self.probe.startup_grace_cycles,
        )?;
        Self::apply_env_string("WARDEN_PROBE_PATH", &mut self.probe.path);

        // Recovery
        Self::apply_env_parse(
            "WARDEN_INITIAL_BACKOFF_MS",
            &mut self.recovery.initial_backoff_ms,
        )?;
        Self::apply_env_parse("WARDEN_MAX_BACKOFF_MS", &mut self.recovery.max_backoff_ms)?;
        Self::apply_env_parse(
            "WARDEN_KILL_TIMEOUT_SECS",
            &mut self.recovery.kill_timeout_secs,
        )?;
        Self::apply_env_parse("WARDEN_MAX_RESTARTS", &mut self.recovery.max_restarts)?;

        // Logging
        Self::apply_env_parse("WARDEN_LOG_LEVEL", &mut self.logging.level)?;
        Self::apply_env_string("WARDEN_LOG_DIR", &mut self.logging.dir);
        Self::apply_env_bool("WARDEN_LOG_COLORED", &mut self.logging.colored)?;

        Ok(())
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts true/false/1/0)
    fn apply_env_bool(var_name: &str, target: &mut bool) -> ConfigErrorResult<()> {
        if let Ok(val) = std::env::var(var_name) {
            *target = match val.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::config(format!(
                        "{var_name} must be true/false/1/0, got {val:?}"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(
        var_name: &str,
        target: &mut T,
    ) -> ConfigErrorResult<()> {
        if let Ok(val) = std::env::var(var_name) {
            *target = val.trim().parse().map_err(|_| {
                ConfigError::config(format!("{var_name} has an invalid value {val:?}"))
            })?;
        }
        Ok(())
    }

    /// Helper: Apply environment variable override for Option<String> values
    fn apply_env_option_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = Some(val);
        }
    }
}
