//! Append-only per-binding log file.

use crate::{SupervisorError, SupervisorResult};

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use chrono::Utc;
use error_location::ErrorLocation;
use tracing::warn;
use wd_config::Binding;

/// Transition events written to the binding log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    Launching,
    Launched,
    LaunchFailed,
    Ready,
    StartupProbe,
    GraceRecheck,
    Recovered,
    Degraded,
    Terminating,
    Terminated,
    KillTimeout,
    Escalated,
    Shutdown,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launching => "launching",
            Self::Launched => "launched",
            Self::LaunchFailed => "launch-failed",
            Self::Ready => "ready",
            Self::StartupProbe => "startup-probe",
            Self::GraceRecheck => "grace-recheck",
            Self::Recovered => "recovered",
            Self::Degraded => "degraded",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
            Self::KillTimeout => "kill-timeout",
            Self::Escalated => "escalated",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `serve-{port}.log` for one binding.
///
/// The supervised child writes its stdout/stderr into the same file through
/// cloned descriptors opened in append mode; transition lines are written
/// whole under the mutex so concurrent appends never interleave mid-line.
#[derive(Debug)]
pub struct BindingLog {
    binding: Binding,
    path: PathBuf,
    file: Mutex<File>,
}

impl BindingLog {
    pub fn open(dir: &Path, binding: &Binding) -> SupervisorResult<Self> {
        let path = dir.join(format!("serve-{}.log", binding.port));

        std::fs::create_dir_all(dir).map_err(|source| SupervisorError::LogSink {
            path: dir.to_path_buf(),
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SupervisorError::LogSink {
                path: path.clone(),
                source,
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Self {
            binding: binding.clone(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one transition line. Write failures are logged, never fatal.
    pub fn record(&self, event: LogEvent, restart_count: u32, detail: &str) {
        let mut line = format!(
            "{} [{}] {} restart_count={}",
            Utc::now().to_rfc3339(),
            event,
            self.binding,
            restart_count
        );
        if !detail.is_empty() {
            line.push(' ');
            line.push_str(detail);
        }
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(binding = %self.binding, path = %self.path.display(), "Failed to write log sink: {e}");
        }
    }

    /// A descriptor for redirecting child output into the sink.
    pub fn stdio(&self) -> SupervisorResult<Stdio> {
        let file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let clone = file.try_clone().map_err(|source| SupervisorError::LogSink {
            path: self.path.clone(),
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(Stdio::from(clone))
    }
}
