use std::time::Duration;

use wd_config::RecoveryConfig;

/// Exponential delay between failed launch attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay after the first failure
    pub initial: Duration,
    /// Cap applied before jitter
    pub max: Duration,
    pub multiplier: f64,
    /// Scale each delay by a random factor in 0.5..1.5
    pub jitter: bool,
}

impl Backoff {
    pub fn from_config(recovery: &RecoveryConfig) -> Self {
        Self {
            initial: Duration::from_millis(recovery.initial_backoff_ms),
            max: Duration::from_millis(recovery.max_backoff_ms),
            multiplier: recovery.backoff_multiplier,
            jitter: recovery.jitter,
        }
    }

    /// Delay before retrying after `failures` consecutive failed launches.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = (self.initial.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max.as_secs_f64());

        if self.jitter {
            let jitter_factor = 0.5 + rand::random::<f64>(); // 0.5 to 1.5
            Duration::from_secs_f64(base * jitter_factor)
        } else {
            Duration::from_secs_f64(base)
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RecoveryConfig::default())
    }
}
