//! Independent supervision loops, one per binding.

use crate::{
    BindingLog, CommandLauncher, HealthProbe, ProcessLauncher, RecoveryOrchestrator,
    RecoveryPolicy, ShutdownCoordinator, SignalTerminator, SupervisorError, SupervisorResult,
    SupervisorStatus, Terminator,
};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use wd_config::{Binding, Config};

pub struct Supervisor {
    orchestrators: Vec<RecoveryOrchestrator>,
}

impl Supervisor {
    pub fn new(orchestrators: Vec<RecoveryOrchestrator>) -> Self {
        Self { orchestrators }
    }

    /// One orchestrator per configured binding. Loops share the launcher and
    /// terminator (both stateless) but nothing mutable.
    pub fn from_config(config: &Config, log_dir: &Path) -> SupervisorResult<Self> {
        let launcher: Arc<dyn ProcessLauncher> =
            Arc::new(CommandLauncher::new(config.service.clone()));
        let terminator: Arc<dyn Terminator> = Arc::new(SignalTerminator::from_config(config));
        let policy = RecoveryPolicy::from_config(config);

        let mut orchestrators = Vec::new();
        for binding in config.bindings() {
            let sink = Arc::new(BindingLog::open(log_dir, &binding)?);
            let probe = HealthProbe::from_config(&config.probe)?;

            info!(binding = %binding, log = %sink.path().display(), "Supervising");

            orchestrators.push(RecoveryOrchestrator::new(
                binding,
                launcher.clone(),
                probe,
                terminator.clone(),
                sink,
                policy.clone(),
            ));
        }

        Ok(Self::new(orchestrators))
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.orchestrators
            .iter()
            .map(|orchestrator| orchestrator.binding().clone())
            .collect()
    }

    /// Status receivers, in binding order.
    pub fn statuses(&self) -> Vec<watch::Receiver<SupervisorStatus>> {
        self.orchestrators
            .iter()
            .map(RecoveryOrchestrator::subscribe)
            .collect()
    }

    /// Run every loop until shutdown.
    ///
    /// A loop that escalates stops on its own while the others keep running;
    /// the first escalation is returned once all loops have finished.
    pub async fn run(self, shutdown: &ShutdownCoordinator) -> SupervisorResult<()> {
        let receivers: Vec<_> = self
            .orchestrators
            .iter()
            .map(|_| shutdown.subscribe())
            .collect();

        // Triggered before subscribing: nothing was launched, nothing to sweep.
        if shutdown.is_shutdown() {
            info!("Shutdown requested before supervision started");
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for (orchestrator, rx) in self.orchestrators.into_iter().zip(receivers) {
            let binding = orchestrator.binding().clone();
            tasks.spawn(async move { (binding, orchestrator.run(rx).await) });
        }

        let mut escalation: Option<SupervisorError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((binding, Ok(()))) => info!(binding = %binding, "Supervision loop stopped"),
                Ok((binding, Err(e))) => {
                    if e.is_recoverable() {
                        warn!(binding = %binding, "Supervision loop stopped: {e}");
                    } else {
                        error!(binding = %binding, "Supervision loop escalated: {e}");
                    }
                    escalation.get_or_insert(e);
                }
                Err(e) => error!("Supervision loop task failed: {e}"),
            }
        }

        match escalation {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// One Terminating sweep for every binding, without launching anything.
    /// Used to clean up orphans from a previous run.
    pub async fn sweep(config: &Config) -> SupervisorResult<()> {
        let terminator = SignalTerminator::from_config(config);

        if config.service.kill_pattern.is_none() {
            warn!("No service.kill_pattern configured; sweep can only confirm ports are free");
        }

        let bindings = config.bindings();
        let results = futures::future::join_all(
            bindings
                .iter()
                .map(|binding| terminator.terminate(binding, None)),
        )
        .await;

        let mut first_error = None;
        for (binding, result) in bindings.iter().zip(results) {
            match result {
                Ok(()) => info!(binding = %binding, "Swept"),
                Err(e) => {
                    warn!(binding = %binding, "Sweep incomplete: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
