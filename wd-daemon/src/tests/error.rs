use crate::error::DaemonError;

use std::panic::Location;

use error_location::ErrorLocation;
use googletest::assert_that;
use googletest::prelude::eq;
use wd_config::ConfigError;
use wd_supervisor::SupervisorError;

#[test]
fn given_config_error_when_exit_code_then_two() {
    let error = DaemonError::from(ConfigError::service("service.command must not be empty"));

    assert_that!(error.exit_code(), eq(2));
    assert!(error.to_string().starts_with("Config error: Service error"));
}

#[test]
fn given_escalation_when_exit_code_then_three() {
    let error = DaemonError::from(SupervisorError::MaxRestartsExceeded {
        binding: "127.0.0.1:11434".into(),
        max: 5,
        location: ErrorLocation::from(Location::caller()),
    });

    assert_that!(error.exit_code(), eq(3));
}

#[test]
fn given_other_errors_when_exit_code_then_one() {
    let launch = DaemonError::from(SupervisorError::PortInUse {
        host: "127.0.0.1".into(),
        port: 11434,
        location: ErrorLocation::from(Location::caller()),
    });
    let logging = DaemonError::logging("Failed to initialize logger");

    assert_that!(launch.exit_code(), eq(1));
    assert_that!(logging.exit_code(), eq(1));
}
