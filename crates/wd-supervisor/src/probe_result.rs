use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Outcome classification of one probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Process exists; readiness probing is disabled
    ProcessAlive,
    ApiResponsive,
    /// Readiness timed out or answered malformed, confirmed after any grace re-checks
    ApiFrozen,
    ProcessMissing,
    /// The optional resource-binding check failed
    ResourceMissing,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessAlive => "process-alive",
            Self::ApiResponsive => "api-responsive",
            Self::ApiFrozen => "api-frozen",
            Self::ProcessMissing => "process-missing",
            Self::ResourceMissing => "resource-missing",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::ProcessAlive | Self::ApiResponsive)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral result handed from the probe to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub kind: ProbeKind,
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
    /// Grace re-checks performed before this result was reported
    pub rechecks: u32,
    /// Last failure message, if any
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn new(kind: ProbeKind, latency: Duration) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            latency,
            rechecks: 0,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_rechecks(mut self, rechecks: u32) -> Self {
        self.rechecks = rechecks;
        self
    }
}
