use crate::ProbeKind;

use std::fmt;

/// Why a binding is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    ProcessMissing,
    ApiFrozen,
    ResourceMissing,
    StartupGraceExhausted,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessMissing => "process-missing",
            Self::ApiFrozen => "api-frozen",
            Self::ResourceMissing => "resource-missing",
            Self::StartupGraceExhausted => "startup-grace-exhausted",
        }
    }

    /// Failure cause carried by an unhealthy probe result.
    pub fn from_probe(kind: ProbeKind) -> Option<Self> {
        match kind {
            ProbeKind::ProcessMissing => Some(Self::ProcessMissing),
            ProbeKind::ApiFrozen => Some(Self::ApiFrozen),
            ProbeKind::ResourceMissing => Some(Self::ResourceMissing),
            ProbeKind::ProcessAlive | ProbeKind::ApiResponsive => None,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of one supervised binding.
///
/// Starting -> Probing -> Healthy <-> Degraded -> Terminating -> Starting.
/// Transitions happen only through `RecoveryOrchestrator::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Starting,
    /// Waiting for the first readiness signal; `cycles` probe cycles done so far
    Probing { cycles: u32 },
    Healthy,
    Degraded { cause: FailureCause },
    Terminating { cause: FailureCause },
}

impl RecoveryState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Probing { .. } => "probing",
            Self::Healthy => "healthy",
            Self::Degraded { .. } => "degraded",
            Self::Terminating { .. } => "terminating",
        }
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probing { cycles } => write!(f, "probing({cycles})"),
            Self::Degraded { cause } => write!(f, "degraded({cause})"),
            Self::Terminating { cause } => write!(f, "terminating({cause})"),
            other => f.write_str(other.name()),
        }
    }
}
