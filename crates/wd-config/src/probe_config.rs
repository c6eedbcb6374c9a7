use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

// Probe constraints
pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const MAX_GRACE_DELAY_SECS: u64 = 300;
pub const DEFAULT_GRACE_DELAY_SECS: u64 = 5;

pub const MIN_STARTUP_GRACE_CYCLES: u32 = 1;
pub const MAX_STARTUP_GRACE_CYCLES: u32 = 1000;
pub const DEFAULT_STARTUP_GRACE_CYCLES: u32 = 10;

pub const DEFAULT_READINESS_PATH: &str = "/api/tags";
pub const DEFAULT_READINESS_MARKER: &str = "models";

/// Liveness / readiness probing cadence and policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Sleep between probe cycles, regardless of the previous result
    pub interval_secs: u64,
    /// Per-request deadline for the readiness check
    pub timeout_secs: u64,
    /// Delay before the single re-check of a frozen endpoint
    pub grace_delay_secs: u64,
    /// Probe cycles allowed for the first readiness signal after launch
    pub startup_grace_cycles: u32,
    /// Disable to supervise on process existence alone
    pub readiness: bool,
    pub path: String,
    /// Top-level JSON key a healthy response must carry
    pub marker: String,
    pub resource: Option<ResourceProbeConfig>,
}

/// Optional command-based probe for an external resource binding
/// (for example a GPU process listing that must mention the runner).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceProbeConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Substring stdout must contain (`{port}` expanded); exit status alone when unset
    pub expect: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            grace_delay_secs: DEFAULT_GRACE_DELAY_SECS,
            startup_grace_cycles: DEFAULT_STARTUP_GRACE_CYCLES,
            readiness: true,
            path: String::from(DEFAULT_READINESS_PATH),
            marker: String::from(DEFAULT_READINESS_MARKER),
            resource: None,
        }
    }
}

impl Default for ResourceProbeConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            expect: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.interval_secs < MIN_INTERVAL_SECS || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::probe(format!(
                "probe.interval_secs must be {}-{}, got {}",
                MIN_INTERVAL_SECS, MAX_INTERVAL_SECS, self.interval_secs
            )));
        }

        if self.timeout_secs < MIN_TIMEOUT_SECS || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::probe(format!(
                "probe.timeout_secs must be {}-{}, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }

        if self.grace_delay_secs > MAX_GRACE_DELAY_SECS {
            return Err(ConfigError::probe(format!(
                "probe.grace_delay_secs must be <= {}, got {}",
                MAX_GRACE_DELAY_SECS, self.grace_delay_secs
            )));
        }

        if self.startup_grace_cycles < MIN_STARTUP_GRACE_CYCLES
            || self.startup_grace_cycles > MAX_STARTUP_GRACE_CYCLES
        {
            return Err(ConfigError::probe(format!(
                "probe.startup_grace_cycles must be {}-{}, got {}",
                MIN_STARTUP_GRACE_CYCLES, MAX_STARTUP_GRACE_CYCLES, self.startup_grace_cycles
            )));
        }

        if self.readiness {
            if !self.path.starts_with('/') {
                return Err(ConfigError::probe(format!(
                    "probe.path must start with '/', got {:?}",
                    self.path
                )));
            }

            if self.marker.trim().is_empty() {
                return Err(ConfigError::probe("probe.marker must not be empty"));
            }
        }

        if let Some(resource) = &self.resource {
            if resource.command.trim().is_empty() {
                return Err(ConfigError::probe(
                    "probe.resource.command must not be empty",
                ));
            }

            if resource.timeout_secs < MIN_TIMEOUT_SECS || resource.timeout_secs > MAX_TIMEOUT_SECS
            {
                return Err(ConfigError::probe(format!(
                    "probe.resource.timeout_secs must be {}-{}, got {}",
                    MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, resource.timeout_secs
                )));
            }
        }

        Ok(())
    }
}
