use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;
use wd_supervisor::SupervisorError;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_ESCALATED: u8 = 3;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Config error: {0}")]
    Config(#[from] wd_config::ConfigError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Logging error: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },
}

impl DaemonError {
    #[track_caller]
    pub fn logging<S: Into<String>>(message: S) -> Self {
        DaemonError::Logging {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Process exit status: config problems and escalations are told apart
    /// from everything else so service managers can react differently.
    pub fn exit_code(&self) -> u8 {
        match self {
            DaemonError::Config(_) => EXIT_CONFIG,
            DaemonError::Supervisor(SupervisorError::MaxRestartsExceeded { .. }) => EXIT_ESCALATED,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
