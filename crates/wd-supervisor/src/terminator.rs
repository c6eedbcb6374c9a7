//! Terminate-by-capability: kill everything bound to a binding, then poll
//! until absence is confirmed or the kill timeout elapses.

use crate::{SupervisedProcess, SupervisorError, SupervisorResult};

use std::net::TcpListener;
use std::panic::Location;
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wd_config::{Binding, Config};

const POLL_INTERVAL_MS: u64 = 100;

#[async_trait]
pub trait Terminator: Send + Sync {
    /// Force-kill `binding`'s processes and wait for confirmed absence.
    ///
    /// `process` is the handle from the last launch, if any; orphan sweeps
    /// pass `None` and rely on the kill pattern and the port.
    async fn terminate(
        &self,
        binding: &Binding,
        process: Option<&mut SupervisedProcess>,
    ) -> SupervisorResult<()>;
}

/// SIGKILLs the process group, the remembered pid and every `pgrep -f`
/// match of the kill pattern.
///
/// Absence is confirmed when the leader is reaped, the group is empty, the
/// pattern matches nothing and the port can be bound again.
pub struct SignalTerminator {
    kill_pattern: Option<String>,
    kill_timeout: Duration,
    poll_interval: Duration,
}

impl SignalTerminator {
    pub fn new(kill_pattern: Option<String>, kill_timeout: Duration) -> Self {
        Self {
            kill_pattern,
            kill_timeout,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.service.kill_pattern.clone(),
            Duration::from_secs(config.recovery.kill_timeout_secs),
        )
    }

    fn signal_all(&self, process: Option<&mut SupervisedProcess>, matches: &[u32]) {
        if let Some(process) = process {
            for (target, what) in kill_targets(process) {
                send_kill(target, what);
            }
            process.start_kill();
        }

        for pid in matches {
            if let Ok(raw) = i32::try_from(*pid) {
                send_kill(Pid::from_raw(raw), "pattern match");
            }
        }
    }

    async fn pattern_matches(&self, binding: &Binding) -> Vec<u32> {
        match &self.kill_pattern {
            Some(pattern) => pgrep(&binding.expand(pattern)).await,
            None => Vec::new(),
        }
    }

    /// Returns what is still present, or `None` once everything is gone.
    fn remaining(
        binding: &Binding,
        process: Option<&mut SupervisedProcess>,
        matches: &[u32],
    ) -> Option<String> {
        if let Some(process) = process {
            if process.is_running() {
                return Some(format!("pid {:?}", process.pid()));
            }
            if let Some(pid) = process.pid().and_then(|pid| i32::try_from(pid).ok())
                && group_exists(pid)
            {
                return Some(format!("process group {pid}"));
            }
        }

        if !matches.is_empty() {
            return Some(format!("pattern matches {matches:?}"));
        }

        if TcpListener::bind((binding.host.as_str(), binding.port)).is_err() {
            return Some(format!("listener on {binding}"));
        }

        None
    }
}

#[async_trait]
impl Terminator for SignalTerminator {
    async fn terminate(
        &self,
        binding: &Binding,
        mut process: Option<&mut SupervisedProcess>,
    ) -> SupervisorResult<()> {
        let deadline = Instant::now() + self.kill_timeout;

        info!(binding = %binding, pid = ?process.as_ref().and_then(|p| p.pid()), "Force-killing");

        loop {
            let matches = self.pattern_matches(binding).await;
            self.signal_all(process.as_deref_mut(), &matches);

            tokio::time::sleep(self.poll_interval).await;

            let matches = self.pattern_matches(binding).await;
            match Self::remaining(binding, process.as_deref_mut(), &matches) {
                None => {
                    debug!(binding = %binding, "Termination confirmed");
                    return Ok(());
                }
                Some(left) if Instant::now() >= deadline => {
                    warn!(binding = %binding, "Still present after kill timeout: {left}");
                    return Err(SupervisorError::KillConfirmationTimeout {
                        binding: binding.to_string(),
                        timeout_secs: self.kill_timeout.as_secs(),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                Some(left) => debug!(binding = %binding, "Waiting for {left}"),
            }
        }
    }
}

/// Signal targets for a handle. The launcher starts each child as a session
/// leader, so pgid == pid. The group is only signalled while it still has
/// members; the pid itself is never signalled once the child is reaped.
pub(crate) fn kill_targets(process: &SupervisedProcess) -> Vec<(Pid, &'static str)> {
    let Some(pid) = process.pid().and_then(|pid| i32::try_from(pid).ok()) else {
        return Vec::new();
    };

    let mut targets = Vec::with_capacity(2);
    if group_exists(pid) {
        targets.push((Pid::from_raw(-pid), "process group"));
    }
    if !process.has_exited() {
        targets.push((Pid::from_raw(pid), "process"));
    }
    targets
}

fn send_kill(target: Pid, what: &str) {
    if let Err(e) = kill(target, Signal::SIGKILL)
        && e != Errno::ESRCH
    {
        warn!(pid = target.as_raw(), error = ?e, "SIGKILL to {what} failed");
    }
}

fn group_exists(pgid: i32) -> bool {
    match kill(Pid::from_raw(-pgid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Pids whose full command line matches `pattern`, excluding our own.
async fn pgrep(pattern: &str) -> Vec<u32> {
    let output = match Command::new("pgrep").arg("-f").arg(pattern).output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("pgrep unavailable, skipping pattern {pattern:?}: {e}");
            return Vec::new();
        }
    };

    let own = std::process::id();
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != own)
        .collect()
}
