mod backoff;
mod readiness;
mod state;
mod terminator;

use crate::{
    Backoff, BindingLog, HealthProbe, LivenessCheck, ProcessLauncher, ReadinessCheck,
    RecoveryOrchestrator, RecoveryPolicy, ResourceCheck, SupervisedProcess, SupervisorError,
    SupervisorResult, Terminator,
};

use std::collections::{HashMap, VecDeque};
use std::panic::Location;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use tempfile::TempDir;
use wd_config::{Binding, ProbeConfig};

pub const INTERVAL: Duration = Duration::from_secs(10);
pub const GRACE_DELAY: Duration = Duration::from_secs(5);

/// Probe settings used across tests: 10s cadence, 5s grace delay, one re-check.
pub fn probe_config() -> ProbeConfig {
    ProbeConfig {
        interval_secs: INTERVAL.as_secs(),
        grace_delay_secs: GRACE_DELAY.as_secs(),
        startup_grace_cycles: 10,
        ..ProbeConfig::default()
    }
}

/// Paused-clock elapsed time, allowing for timer tick rounding.
pub fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(100),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

pub fn no_jitter_backoff() -> Backoff {
    Backoff {
        initial: Duration::from_secs(1),
        max: Duration::from_secs(30),
        multiplier: 2.0,
        jitter: false,
    }
}

/// Outcomes served in order, then `fallback` forever.
pub struct Script {
    queue: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicU32,
}

impl Script {
    pub fn new(outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            queue: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    fn next(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().unwrap().pop_front().unwrap_or(self.fallback)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct ScriptedLiveness(pub Script);

#[async_trait]
impl LivenessCheck for ScriptedLiveness {
    async fn is_alive(&self, _process: &mut SupervisedProcess) -> bool {
        self.0.next()
    }
}

pub struct ScriptedReadiness(pub Script);

#[async_trait]
impl ReadinessCheck for ScriptedReadiness {
    async fn check(&self, binding: &Binding) -> SupervisorResult<()> {
        if self.0.next() {
            Ok(())
        } else {
            Err(SupervisorError::ProbeTimeout {
                binding: binding.to_string(),
                timeout_secs: 10,
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}

pub struct ScriptedResource(pub Script);

#[async_trait]
impl ResourceCheck for ScriptedResource {
    async fn check(&self, process: &SupervisedProcess) -> SupervisorResult<()> {
        if self.0.next() {
            Ok(())
        } else {
            Err(SupervisorError::ResourceMissing {
                binding: process.binding().to_string(),
                message: "runner not listed".into(),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}

/// Live handle count per binding, shared by the fake launcher and terminator.
#[derive(Default)]
pub struct Ledger {
    active: Mutex<HashMap<Binding, u32>>,
    overlaps: AtomicU32,
}

impl Ledger {
    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn active(&self, binding: &Binding) -> u32 {
        self.active
            .lock()
            .unwrap()
            .get(binding)
            .copied()
            .unwrap_or(0)
    }
}

pub struct FakeLauncher {
    ledger: Arc<Ledger>,
    failures_left: AtomicU32,
    launches: AtomicU32,
}

impl FakeLauncher {
    pub fn new(ledger: Arc<Ledger>, failures: u32) -> Self {
        Self {
            ledger,
            failures_left: AtomicU32::new(failures),
            launches: AtomicU32::new(0),
        }
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(
        &self,
        binding: &Binding,
        restart_count: u32,
        _sink: &BindingLog,
    ) -> SupervisorResult<SupervisedProcess> {
        let attempt = self.launches.fetch_add(1, Ordering::SeqCst) + 1;

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SupervisorError::BinaryNotFound {
                command: "ollama".into(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let mut active = self.ledger.active.lock().unwrap();
        let count = active.entry(binding.clone()).or_insert(0);
        if *count > 0 {
            self.ledger.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        *count += 1;

        Ok(SupervisedProcess::detached(
            binding.clone(),
            Some(40_000 + attempt),
            restart_count,
        ))
    }
}

pub struct FakeTerminator {
    ledger: Arc<Ledger>,
    confirm: bool,
    terminations: AtomicU32,
}

impl FakeTerminator {
    pub fn new(ledger: Arc<Ledger>, confirm: bool) -> Self {
        Self {
            ledger,
            confirm,
            terminations: AtomicU32::new(0),
        }
    }

    pub fn terminations(&self) -> u32 {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Terminator for FakeTerminator {
    async fn terminate(
        &self,
        binding: &Binding,
        _process: Option<&mut SupervisedProcess>,
    ) -> SupervisorResult<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);

        if !self.confirm {
            return Err(SupervisorError::KillConfirmationTimeout {
                binding: binding.to_string(),
                timeout_secs: 10,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.ledger.active.lock().unwrap().insert(binding.clone(), 0);
        Ok(())
    }
}

/// An orchestrator wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub orchestrator: RecoveryOrchestrator,
    pub launcher: Arc<FakeLauncher>,
    pub terminator: Arc<FakeTerminator>,
    pub liveness: Arc<ScriptedLiveness>,
    pub readiness: Arc<ScriptedReadiness>,
    pub ledger: Arc<Ledger>,
    pub sink: Arc<BindingLog>,
    _log_dir: TempDir,
}

pub struct HarnessBuilder {
    binding: Binding,
    liveness: Script,
    readiness: Script,
    launch_failures: u32,
    confirm_kills: bool,
    startup_grace_cycles: u32,
    max_restarts: u32,
}

impl HarnessBuilder {
    pub fn new(port: u16) -> Self {
        Self {
            binding: Binding::new("127.0.0.1", port),
            liveness: Script::new([false; 0], true),
            readiness: Script::new([false; 0], true),
            launch_failures: 0,
            confirm_kills: true,
            startup_grace_cycles: 10,
            max_restarts: 0,
        }
    }

    pub fn liveness(mut self, outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        self.liveness = Script::new(outcomes, fallback);
        self
    }

    pub fn readiness(mut self, outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        self.readiness = Script::new(outcomes, fallback);
        self
    }

    pub fn launch_failures(mut self, failures: u32) -> Self {
        self.launch_failures = failures;
        self
    }

    pub fn unconfirmed_kills(mut self) -> Self {
        self.confirm_kills = false;
        self
    }

    pub fn startup_grace_cycles(mut self, cycles: u32) -> Self {
        self.startup_grace_cycles = cycles;
        self
    }

    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    pub fn build(self) -> Harness {
        let log_dir = TempDir::new().unwrap();
        let ledger = Arc::new(Ledger::default());
        let launcher = Arc::new(FakeLauncher::new(ledger.clone(), self.launch_failures));
        let terminator = Arc::new(FakeTerminator::new(ledger.clone(), self.confirm_kills));
        let liveness = Arc::new(ScriptedLiveness(self.liveness));
        let readiness = Arc::new(ScriptedReadiness(self.readiness));
        let sink = Arc::new(BindingLog::open(log_dir.path(), &self.binding).unwrap());

        let probe = HealthProbe::new(
            &probe_config(),
            liveness.clone(),
            Some(readiness.clone() as Arc<dyn ReadinessCheck>),
        );
        let policy = RecoveryPolicy {
            backoff: no_jitter_backoff(),
            startup_grace_cycles: self.startup_grace_cycles,
            max_restarts: self.max_restarts,
        };

        let orchestrator = RecoveryOrchestrator::new(
            self.binding,
            launcher.clone(),
            probe,
            terminator.clone(),
            sink.clone(),
            policy,
        );

        Harness {
            orchestrator,
            launcher,
            terminator,
            liveness,
            readiness,
            ledger,
            sink,
            _log_dir: log_dir,
        }
    }
}

impl Harness {
    /// Everything written to the binding log so far.
    pub fn log(&self) -> String {
        std::fs::read_to_string(self.sink.path()).unwrap()
    }
}
