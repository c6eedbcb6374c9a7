use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Binary {command:?} not found {location}")]
    BinaryNotFound {
        command: String,
        location: ErrorLocation,
    },

    #[error("Failed to spawn {command:?}: {source} {location}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Port {port} on {host} is in use by another process {location}")]
    PortInUse {
        host: String,
        port: u16,
        location: ErrorLocation,
    },

    #[error("Failed to open log sink at {path}: {source} {location}")]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Readiness check on {binding} timed out after {timeout_secs}s {location}")]
    ProbeTimeout {
        binding: String,
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error("Malformed response from {binding}: {message} {location}")]
    MalformedResponse {
        binding: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Process for {binding} is not running {location}")]
    ProcessMissing {
        binding: String,
        location: ErrorLocation,
    },

    #[error("Resource check for {binding} failed: {message} {location}")]
    ResourceMissing {
        binding: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("{binding} did not become ready within {cycles} probe cycles {location}")]
    StartupGraceExhausted {
        binding: String,
        cycles: u32,
        location: ErrorLocation,
    },

    #[error("Could not confirm termination of {binding} within {timeout_secs}s {location}")]
    KillConfirmationTimeout {
        binding: String,
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error(
        "{binding} exceeded {max} consecutive starts without becoming healthy {location}"
    )]
    MaxRestartsExceeded {
        binding: String,
        max: u32,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("HTTP error: {source} {location}")]
    Http {
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },
}

impl SupervisorError {
    /// Failures of the Starting state; retried after a backoff delay.
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::BinaryNotFound { .. }
                | Self::ProcessSpawn { .. }
                | Self::PortInUse { .. }
                | Self::LogSink { .. }
        )
    }

    /// Whether the loop handles this error itself instead of stopping.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MaxRestartsExceeded { .. })
    }

    /// Readiness failures that a grace re-check may clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProbeTimeout { .. } | Self::MalformedResponse { .. } | Self::Http { .. }
        )
    }
}

impl From<std::io::Error> for SupervisorError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for SupervisorError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        Self::Http {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
