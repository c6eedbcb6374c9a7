use crate::SupervisedProcess;

use async_trait::async_trait;

/// Existence-only check: is the supervised process still present.
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn is_alive(&self, process: &mut SupervisedProcess) -> bool;
}

/// Checks the child handle, falling back to a signal-0 probe of the pid.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLiveness;

#[async_trait]
impl LivenessCheck for ProcessLiveness {
    async fn is_alive(&self, process: &mut SupervisedProcess) -> bool {
        process.is_running()
    }
}
