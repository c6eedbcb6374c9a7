use crate::{ProbeResult, RecoveryState};

use chrono::{DateTime, Utc};
use wd_config::Binding;

/// Snapshot published by an orchestrator after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorStatus {
    pub binding: Binding,
    pub state: RecoveryState,
    pub restart_count: u32,
    pub pid: Option<u32>,
    pub last_probe: Option<ProbeResult>,
    pub updated_at: DateTime<Utc>,
}

impl SupervisorStatus {
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            state: RecoveryState::Starting,
            restart_count: 0,
            pid: None,
            last_probe: None,
            updated_at: Utc::now(),
        }
    }
}
