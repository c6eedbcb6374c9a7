//! One managed server instance.

use std::time::Duration;

use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::debug;
use wd_config::Binding;

/// A launched process bound to one host:port.
///
/// Owned by exactly one orchestrator loop. Dropped once termination has
/// been confirmed (or given up on), which invalidates the handle.
#[derive(Debug)]
pub struct SupervisedProcess {
    binding: Binding,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    restart_count: u32,
    child: Option<Child>,
    exited: bool,
}

impl SupervisedProcess {
    /// Wraps a child spawned by the launcher.
    pub fn spawned(binding: Binding, child: Child, restart_count: u32) -> Self {
        Self {
            binding,
            pid: child.id(),
            started_at: Utc::now(),
            restart_count,
            child: Some(child),
            exited: false,
        }
    }

    /// A process known only by pid (or not at all), without a child handle.
    pub fn detached(binding: Binding, pid: Option<u32>, restart_count: u32) -> Self {
        Self {
            binding,
            pid,
            started_at: Utc::now(),
            restart_count,
            child: None,
            exited: false,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }

    /// True once the child has been reaped. The pid may belong to an
    /// unrelated process from then on.
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Whether the underlying process still exists.
    ///
    /// With a child handle this reaps the process once it exits, so a
    /// zombie never counts as running. A reaped handle is never running.
    pub fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }

        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return true,
                Ok(Some(status)) => {
                    debug!(binding = %self.binding, %status, "Supervised process exited");
                    self.child = None;
                    self.exited = true;
                    return false;
                }
                Err(e) => {
                    debug!(binding = %self.binding, "try_wait failed, falling back to pid: {e}");
                }
            }
        }

        match self.pid {
            Some(pid) => pid_exists(pid),
            None => false,
        }
    }

    /// Request an immediate kill of the direct child, if we hold it.
    pub fn start_kill(&mut self) {
        if let Some(child) = self.child.as_mut()
            && let Err(e) = child.start_kill()
        {
            debug!(binding = %self.binding, "start_kill failed: {e}");
        }
    }
}

/// Signal 0 probe; EPERM still means the pid exists.
pub(crate) fn pid_exists(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
