//! Periodic liveness / readiness probing with a grace re-check policy.

use crate::{
    CommandResourceCheck, HttpReadinessCheck, LivenessCheck, ProbeKind, ProbeResult,
    ProcessLiveness, ReadinessCheck, ResourceCheck, SupervisedProcess, SupervisorError,
    SupervisorResult,
};

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::time::Instant;
use tracing::{debug, warn};
use wd_config::ProbeConfig;

/// Grace re-checks before a frozen endpoint is confirmed.
const GRACE_RECHECKS: u32 = 1;

/// How an ambiguous readiness failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Before the first readiness signal: report failures as-is, the
    /// startup grace window absorbs them
    Startup,
    /// After readiness: re-check frozen results before confirming them
    Steady,
}

pub struct HealthProbe {
    interval: Duration,
    grace_delay: Duration,
    liveness: Arc<dyn LivenessCheck>,
    readiness: Option<Arc<dyn ReadinessCheck>>,
    resource: Option<Arc<dyn ResourceCheck>>,
}

impl HealthProbe {
    /// Probe with explicit checks; `readiness: None` is liveness-only mode.
    pub fn new(
        probe: &ProbeConfig,
        liveness: Arc<dyn LivenessCheck>,
        readiness: Option<Arc<dyn ReadinessCheck>>,
    ) -> Self {
        Self {
            interval: Duration::from_secs(probe.interval_secs),
            grace_delay: Duration::from_secs(probe.grace_delay_secs),
            liveness,
            readiness,
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: Arc<dyn ResourceCheck>) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn from_config(probe: &ProbeConfig) -> SupervisorResult<Self> {
        let readiness: Option<Arc<dyn ReadinessCheck>> = if probe.readiness {
            Some(Arc::new(HttpReadinessCheck::from_config(probe)?))
        } else {
            None
        };

        let health_probe = Self::new(probe, Arc::new(ProcessLiveness), readiness);

        Ok(match &probe.resource {
            Some(resource) => {
                let resource = CommandResourceCheck::from_config(resource);
                health_probe.with_resource(Arc::new(resource))
            }
            None => health_probe,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn grace_delay(&self) -> Duration {
        self.grace_delay
    }

    /// Sleep one interval, then probe. The cadence does not depend on the
    /// previous result.
    pub async fn next_cycle(
        &self,
        process: &mut SupervisedProcess,
        mode: ProbeMode,
    ) -> ProbeResult {
        tokio::time::sleep(self.interval).await;
        self.probe(process, mode).await
    }

    /// One probe cycle.
    ///
    /// Existence is checked first and a missing process is reported at once.
    /// In steady mode a failed readiness check is repeated exactly once after
    /// the grace delay; only a second consecutive failure confirms it.
    pub async fn probe(&self, process: &mut SupervisedProcess, mode: ProbeMode) -> ProbeResult {
        let started = Instant::now();

        if !self.liveness.is_alive(process).await {
            return ProbeResult::new(ProbeKind::ProcessMissing, started.elapsed());
        }

        if let Some(resource) = &self.resource
            && let Err(e) = resource.check(process).await
        {
            return ProbeResult::new(ProbeKind::ResourceMissing, started.elapsed())
                .with_detail(e.to_string());
        }

        let Some(readiness) = &self.readiness else {
            return ProbeResult::new(ProbeKind::ProcessAlive, started.elapsed());
        };

        let first_error = match readiness.check(process.binding()).await {
            Ok(()) => return ProbeResult::new(ProbeKind::ApiResponsive, started.elapsed()),
            Err(e) => Self::describe(process, e),
        };

        if mode == ProbeMode::Startup {
            return ProbeResult::new(ProbeKind::ApiFrozen, started.elapsed())
                .with_detail(first_error);
        }

        debug!(
            binding = %process.binding(),
            "Readiness failed ({first_error}), re-checking in {:?}",
            self.grace_delay
        );
        tokio::time::sleep(self.grace_delay).await;

        if !self.liveness.is_alive(process).await {
            return ProbeResult::new(ProbeKind::ProcessMissing, started.elapsed())
                .with_rechecks(GRACE_RECHECKS);
        }

        match readiness.check(process.binding()).await {
            Ok(()) => ProbeResult::new(ProbeKind::ApiResponsive, started.elapsed())
                .with_rechecks(GRACE_RECHECKS),
            Err(e) => ProbeResult::new(ProbeKind::ApiFrozen, started.elapsed())
                .with_rechecks(GRACE_RECHECKS)
                .with_detail(Self::describe(process, e)),
        }
    }

    /// Timeouts and bad bodies are the expected shape of a frozen endpoint;
    /// anything else is worth a warning on its own.
    fn describe(process: &SupervisedProcess, error: SupervisorError) -> String {
        if !error.is_transient() {
            warn!(binding = %process.binding(), "Unexpected readiness failure: {error}");
        }
        error.to_string()
    }

    /// Lazy, infinite sequence of probe cycles at a fixed cadence.
    /// Dropping the stream stops probing; calling again starts a fresh one.
    ///
    /// Each item is one `next_cycle`. The orchestrator calls `next_cycle`
    /// directly because every result may change its state.
    pub fn cycles<'a>(
        &'a self,
        process: &'a mut SupervisedProcess,
        mode: ProbeMode,
    ) -> impl Stream<Item = ProbeResult> + 'a {
        futures::stream::unfold(process, move |process| async move {
            let result = self.next_cycle(process, mode).await;
            Some((result, process))
        })
    }
}
