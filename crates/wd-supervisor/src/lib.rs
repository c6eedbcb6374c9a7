mod backoff;
mod error;
mod launcher;
mod liveness;
mod log_sink;
mod orchestrator;
mod probe;
mod probe_result;
mod process;
mod readiness;
mod recovery_state;
mod resource;
mod shutdown;
mod status;
mod supervisor;
mod terminator;

pub use backoff::Backoff;
pub use error::{Result as SupervisorResult, SupervisorError};
pub use launcher::{CommandLauncher, ProcessLauncher};
pub use liveness::{LivenessCheck, ProcessLiveness};
pub use log_sink::{BindingLog, LogEvent};
pub use orchestrator::{RecoveryOrchestrator, RecoveryPolicy};
pub use probe::{HealthProbe, ProbeMode};
pub use probe_result::{ProbeKind, ProbeResult};
pub use process::SupervisedProcess;
pub use readiness::{HttpReadinessCheck, ReadinessCheck};
pub use recovery_state::{FailureCause, RecoveryState};
pub use resource::{CommandResourceCheck, ResourceCheck};
pub use shutdown::ShutdownCoordinator;
pub use status::SupervisorStatus;
pub use supervisor::Supervisor;
pub use terminator::{SignalTerminator, Terminator};

#[cfg(test)]
mod tests;
