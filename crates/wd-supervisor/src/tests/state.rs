use crate::{FailureCause, ProbeKind, RecoveryState, SupervisorError};

use std::panic::Location;

use error_location::ErrorLocation;

#[test]
fn given_probe_kinds_when_display_then_kebab_case() {
    assert_eq!(ProbeKind::ProcessAlive.to_string(), "process-alive");
    assert_eq!(ProbeKind::ApiResponsive.to_string(), "api-responsive");
    assert_eq!(ProbeKind::ApiFrozen.to_string(), "api-frozen");
    assert_eq!(ProbeKind::ProcessMissing.to_string(), "process-missing");
    assert_eq!(ProbeKind::ResourceMissing.to_string(), "resource-missing");
}

#[test]
fn given_unhealthy_probe_kind_when_from_probe_then_matching_cause() {
    assert_eq!(
        FailureCause::from_probe(ProbeKind::ProcessMissing),
        Some(FailureCause::ProcessMissing)
    );
    assert_eq!(
        FailureCause::from_probe(ProbeKind::ApiFrozen),
        Some(FailureCause::ApiFrozen)
    );
    assert_eq!(
        FailureCause::from_probe(ProbeKind::ResourceMissing),
        Some(FailureCause::ResourceMissing)
    );
    assert_eq!(FailureCause::from_probe(ProbeKind::ApiResponsive), None);
    assert_eq!(FailureCause::from_probe(ProbeKind::ProcessAlive), None);
}

#[test]
fn given_states_when_display_then_name_and_detail() {
    assert_eq!(RecoveryState::Starting.to_string(), "starting");
    assert_eq!(RecoveryState::Probing { cycles: 3 }.to_string(), "probing(3)");
    assert_eq!(
        RecoveryState::Terminating {
            cause: FailureCause::StartupGraceExhausted
        }
        .to_string(),
        "terminating(startup-grace-exhausted)"
    );
}

#[test]
fn given_launch_errors_when_classified_then_launch_and_recoverable() {
    let error = SupervisorError::PortInUse {
        host: "127.0.0.1".into(),
        port: 11434,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(error.is_launch_error());
    assert!(error.is_recoverable());
    assert!(!error.is_transient());
}

#[test]
fn given_escalation_when_classified_then_not_recoverable() {
    let error = SupervisorError::MaxRestartsExceeded {
        binding: "127.0.0.1:11434".into(),
        max: 3,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(!error.is_recoverable());
    assert!(!error.is_launch_error());
}

#[test]
fn given_probe_timeout_when_classified_then_transient() {
    let error = SupervisorError::ProbeTimeout {
        binding: "127.0.0.1:11434".into(),
        timeout_secs: 10,
        location: ErrorLocation::from(Location::caller()),
    };

    assert!(error.is_transient());
    assert!(error.is_recoverable());
}

#[test]
fn given_io_error_from_launcher_when_classified_then_retried_but_not_a_launch_error() {
    let error = SupervisorError::from(std::io::Error::other("fork failed"));

    assert!(!error.is_launch_error());
    assert!(error.is_recoverable());
    assert!(!error.is_transient());
}
