//! The per-binding supervision loop.

use crate::{
    Backoff, BindingLog, FailureCause, HealthProbe, LogEvent, ProbeKind, ProbeMode, ProbeResult,
    ProcessLauncher, RecoveryState, SupervisedProcess, SupervisorError, SupervisorResult,
    SupervisorStatus, Terminator,
};

use std::panic::Location;
use std::sync::Arc;

use chrono::Utc;
use error_location::ErrorLocation;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use wd_config::{Binding, Config};

/// Loop-level policy taken from configuration.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    pub backoff: Backoff,
    /// Probe cycles allowed for the first readiness signal
    pub startup_grace_cycles: u32,
    /// Consecutive Starting entries without reaching Healthy (0 = unbounded)
    pub max_restarts: u32,
}

impl RecoveryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backoff: Backoff::from_config(&config.recovery),
            startup_grace_cycles: config.probe.startup_grace_cycles,
            max_restarts: config.recovery.max_restarts,
        }
    }
}

/// Drives one binding through
/// Starting -> Probing -> Healthy <-> Degraded -> Terminating -> Starting.
///
/// The loop is sequential: a kill is always confirmed (or timed out) and the
/// old handle dropped before the next launch on the same binding. Every
/// recoverable failure stays inside the loop as a log event; only the
/// optional restart cap ends it with an error.
pub struct RecoveryOrchestrator {
    binding: Binding,
    launcher: Arc<dyn ProcessLauncher>,
    probe: HealthProbe,
    terminator: Arc<dyn Terminator>,
    sink: Arc<BindingLog>,
    policy: RecoveryPolicy,
    process: Option<SupervisedProcess>,
    restart_count: u32,
    starts_since_healthy: u32,
    launch_failures: u32,
    last_probe: Option<ProbeResult>,
    status_tx: watch::Sender<SupervisorStatus>,
}

impl RecoveryOrchestrator {
    pub fn new(
        binding: Binding,
        launcher: Arc<dyn ProcessLauncher>,
        probe: HealthProbe,
        terminator: Arc<dyn Terminator>,
        sink: Arc<BindingLog>,
        policy: RecoveryPolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(SupervisorStatus::new(binding.clone()));

        Self {
            binding,
            launcher,
            probe,
            terminator,
            sink,
            policy,
            process: None,
            restart_count: 0,
            starts_since_healthy: 0,
            launch_failures: 0,
            last_probe: None,
            status_tx,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Starting entries so far. Never reset while the loop runs.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn process(&self) -> Option<&SupervisedProcess> {
        self.process.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status_tx.subscribe()
    }

    /// Enter the initial Starting state.
    pub fn begin(&mut self) -> RecoveryState {
        let state = RecoveryState::Starting;
        self.enter(state);
        state
    }

    /// Perform the entry action of `state` and return the next state.
    ///
    /// Errors only with `MaxRestartsExceeded` when a restart cap is set.
    pub async fn step(&mut self, state: RecoveryState) -> SupervisorResult<RecoveryState> {
        let next = match state {
            RecoveryState::Starting => self.start().await?,
            RecoveryState::Probing { cycles } => self.await_readiness(cycles).await,
            RecoveryState::Healthy => self.monitor().await,
            RecoveryState::Degraded { cause } => self.degrade(cause),
            RecoveryState::Terminating { cause } => self.terminate(cause).await,
        };

        self.enter(next);
        Ok(next)
    }

    /// Run until shutdown, then sweep the binding once.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> SupervisorResult<()> {
        let mut state = self.begin();
        info!(
            binding = %self.binding,
            interval = ?self.probe.interval(),
            "Supervision loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                next = self.step(state) => state = next?,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Final Terminating sweep for this binding.
    pub async fn shutdown(&mut self) {
        info!(binding = %self.binding, restart_count = self.restart_count, "Final sweep");
        self.sink.record(LogEvent::Shutdown, self.restart_count, "final sweep");

        match self
            .terminator
            .terminate(&self.binding, self.process.as_mut())
            .await
        {
            Ok(()) => self.sink.record(LogEvent::Terminated, self.restart_count, "shutdown"),
            Err(e) => {
                warn!(binding = %self.binding, "Final sweep incomplete: {e}");
                self.sink.record(LogEvent::KillTimeout, self.restart_count, "shutdown");
            }
        }

        self.process = None;
    }

    fn enter(&mut self, state: RecoveryState) {
        match state {
            RecoveryState::Starting => {
                self.restart_count += 1;
                self.starts_since_healthy += 1;
            }
            RecoveryState::Healthy => self.starts_since_healthy = 0,
            _ => {}
        }

        self.status_tx.send_replace(SupervisorStatus {
            binding: self.binding.clone(),
            state,
            restart_count: self.restart_count,
            pid: self.process.as_ref().and_then(SupervisedProcess::pid),
            last_probe: self.last_probe.clone(),
            updated_at: Utc::now(),
        });
    }

    async fn start(&mut self) -> SupervisorResult<RecoveryState> {
        let max = self.policy.max_restarts;
        if max > 0 && self.starts_since_healthy > max {
            error!(
                binding = %self.binding,
                restart_count = self.restart_count,
                "Escalating: {max} consecutive starts without becoming healthy"
            );
            self.sink.record(
                LogEvent::Escalated,
                self.restart_count,
                &format!("max_restarts={max}"),
            );
            return Err(SupervisorError::MaxRestartsExceeded {
                binding: self.binding.to_string(),
                max,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.sink.record(LogEvent::Launching, self.restart_count, "");

        match self
            .launcher
            .launch(&self.binding, self.restart_count, &self.sink)
            .await
        {
            Ok(process) => {
                let pid = process.pid();
                info!(binding = %self.binding, ?pid, restart_count = self.restart_count, "Launched");
                self.sink.record(
                    LogEvent::Launched,
                    self.restart_count,
                    &format!("pid={}", pid.map_or_else(|| "?".into(), |p| p.to_string())),
                );
                self.launch_failures = 0;
                self.last_probe = None;
                self.process = Some(process);
                Ok(RecoveryState::Probing { cycles: 0 })
            }
            Err(e) => {
                self.launch_failures += 1;
                let delay = self.policy.backoff.delay(self.launch_failures);
                if e.is_launch_error() {
                    warn!(
                        binding = %self.binding,
                        restart_count = self.restart_count,
                        "Launch failed, retrying in {delay:?}: {e}"
                    );
                } else {
                    error!(
                        binding = %self.binding,
                        restart_count = self.restart_count,
                        "Launcher returned an unexpected error, retrying in {delay:?}: {e}"
                    );
                }
                self.sink.record(
                    LogEvent::LaunchFailed,
                    self.restart_count,
                    &format!("retry_in={}ms {e}", delay.as_millis()),
                );
                tokio::time::sleep(delay).await;
                Ok(RecoveryState::Starting)
            }
        }
    }

    async fn await_readiness(&mut self, cycles: u32) -> RecoveryState {
        let Some(process) = self.process.as_mut() else {
            return RecoveryState::Terminating {
                cause: FailureCause::ProcessMissing,
            };
        };

        let result = self.probe.next_cycle(process, ProbeMode::Startup).await;
        let cycles = cycles + 1;
        let grace = self.policy.startup_grace_cycles;
        let kind = result.kind;
        self.last_probe = Some(result);

        match kind {
            ProbeKind::ApiResponsive | ProbeKind::ProcessAlive => {
                info!(binding = %self.binding, "Ready after {cycles} probe cycle(s)");
                self.sink.record(
                    LogEvent::Ready,
                    self.restart_count,
                    &format!("cycles={cycles} probe={kind}"),
                );
                RecoveryState::Healthy
            }
            ProbeKind::ProcessMissing => {
                warn!(binding = %self.binding, "Process exited during startup");
                self.sink.record(
                    LogEvent::StartupProbe,
                    self.restart_count,
                    &format!("cycle={cycles}/{grace} probe={kind}"),
                );
                RecoveryState::Terminating {
                    cause: FailureCause::ProcessMissing,
                }
            }
            ProbeKind::ApiFrozen | ProbeKind::ResourceMissing if cycles >= grace => {
                warn!(binding = %self.binding, "Not ready after {grace} probe cycles");
                self.sink.record(
                    LogEvent::StartupProbe,
                    self.restart_count,
                    &format!("cycle={cycles}/{grace} probe={kind} grace exhausted"),
                );
                RecoveryState::Terminating {
                    cause: FailureCause::StartupGraceExhausted,
                }
            }
            ProbeKind::ApiFrozen | ProbeKind::ResourceMissing => {
                debug!(binding = %self.binding, "Not ready yet ({cycles}/{grace})");
                self.sink.record(
                    LogEvent::StartupProbe,
                    self.restart_count,
                    &format!("cycle={cycles}/{grace} probe={kind}"),
                );
                RecoveryState::Probing { cycles }
            }
        }
    }

    async fn monitor(&mut self) -> RecoveryState {
        let Some(process) = self.process.as_mut() else {
            return RecoveryState::Degraded {
                cause: FailureCause::ProcessMissing,
            };
        };

        let result = self.probe.next_cycle(process, ProbeMode::Steady).await;

        if result.rechecks > 0 {
            self.sink.record(
                LogEvent::GraceRecheck,
                self.restart_count,
                &format!(
                    "rechecks={} delay={:?} probe={}",
                    result.rechecks,
                    self.probe.grace_delay(),
                    result.kind
                ),
            );
        }

        let next = match FailureCause::from_probe(result.kind) {
            None => {
                if result.rechecks > 0 {
                    info!(binding = %self.binding, "Recovered during grace window");
                    self.sink.record(LogEvent::Recovered, self.restart_count, "");
                }
                RecoveryState::Healthy
            }
            Some(cause) => RecoveryState::Degraded { cause },
        };

        self.last_probe = Some(result);
        next
    }

    fn degrade(&mut self, cause: FailureCause) -> RecoveryState {
        let detail = self
            .last_probe
            .as_ref()
            .and_then(|probe| probe.detail.clone())
            .unwrap_or_default();

        let uptime = self.process.as_ref().map(SupervisedProcess::uptime);
        warn!(
            binding = %self.binding,
            %cause,
            restart_count = self.restart_count,
            ?uptime,
            "Degraded, restarting: {detail}"
        );
        self.sink.record(
            LogEvent::Degraded,
            self.restart_count,
            format!("cause={cause} {detail}").trim_end(),
        );

        RecoveryState::Terminating { cause }
    }

    async fn terminate(&mut self, cause: FailureCause) -> RecoveryState {
        self.sink.record(
            LogEvent::Terminating,
            self.restart_count,
            &format!("cause={cause}"),
        );

        match self
            .terminator
            .terminate(&self.binding, self.process.as_mut())
            .await
        {
            Ok(()) => {
                info!(binding = %self.binding, %cause, "Terminated");
                self.sink.record(
                    LogEvent::Terminated,
                    self.restart_count,
                    &format!("cause={cause}"),
                );
            }
            Err(e) => {
                warn!(binding = %self.binding, %cause, "Proceeding without kill confirmation: {e}");
                self.sink.record(
                    LogEvent::KillTimeout,
                    self.restart_count,
                    &format!("cause={cause}"),
                );
            }
        }

        self.process = None;
        RecoveryState::Starting
    }
}
