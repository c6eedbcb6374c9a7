use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

// Recovery constraints
pub const MIN_INITIAL_BACKOFF_MS: u64 = 10;
pub const MAX_INITIAL_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

pub const MAX_MAX_BACKOFF_MS: u64 = 600_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

pub const MIN_BACKOFF_MULTIPLIER: f64 = 1.0;
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_JITTER: bool = true;

pub const MIN_KILL_TIMEOUT_SECS: u64 = 1;
pub const MAX_KILL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_KILL_TIMEOUT_SECS: u64 = 10;

/// 0 keeps recovery unbounded.
pub const DEFAULT_MAX_RESTARTS: u32 = 0;

/// Relaunch policy for a supervised binding.
///
/// Backoff is exponential between failed launch attempts, with optional
/// jitter so parallel instances do not relaunch in lockstep.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Delay after the first failed launch, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for the launch backoff, in milliseconds
    pub max_backoff_ms: u64,
    /// Multiplier applied per consecutive launch failure
    pub backoff_multiplier: f64,
    /// Randomize each delay by +/-50%
    pub jitter: bool,
    /// Bound on waiting for confirmed process absence after a kill
    pub kill_timeout_secs: u64,
    /// Consecutive starts without reaching Healthy before escalating (0 = never)
    pub max_restarts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            kill_timeout_secs: DEFAULT_KILL_TIMEOUT_SECS,
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.initial_backoff_ms < MIN_INITIAL_BACKOFF_MS
            || self.initial_backoff_ms > MAX_INITIAL_BACKOFF_MS
        {
            return Err(ConfigError::recovery(format!(
                "recovery.initial_backoff_ms must be {}-{}, got {}",
                MIN_INITIAL_BACKOFF_MS, MAX_INITIAL_BACKOFF_MS, self.initial_backoff_ms
            )));
        }

        if self.max_backoff_ms < self.initial_backoff_ms || self.max_backoff_ms > MAX_MAX_BACKOFF_MS
        {
            return Err(ConfigError::recovery(format!(
                "recovery.max_backoff_ms must be {}-{}, got {}",
                self.initial_backoff_ms, MAX_MAX_BACKOFF_MS, self.max_backoff_ms
            )));
        }

        if self.backoff_multiplier < MIN_BACKOFF_MULTIPLIER
            || self.backoff_multiplier > MAX_BACKOFF_MULTIPLIER
        {
            return Err(ConfigError::recovery(format!(
                "recovery.backoff_multiplier must be {}-{}, got {}",
                MIN_BACKOFF_MULTIPLIER, MAX_BACKOFF_MULTIPLIER, self.backoff_multiplier
            )));
        }

        if self.kill_timeout_secs < MIN_KILL_TIMEOUT_SECS
            || self.kill_timeout_secs > MAX_KILL_TIMEOUT_SECS
        {
            return Err(ConfigError::recovery(format!(
                "recovery.kill_timeout_secs must be {}-{}, got {}",
                MIN_KILL_TIMEOUT_SECS, MAX_KILL_TIMEOUT_SECS, self.kill_timeout_secs
            )));
        }

        Ok(())
    }
}
