//! The controller and its three fixed-delay control loops.
//!
//! Each loop does one unit of work, sleeps its delay, and repeats until the
//! handle's cancellation token fires. A slow unit pushes the next one out
//! rather than overlapping it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::Verbosity;
use super::admission::{AdmissionController, DispatchOutcome};
use super::budget::BudgetPolicy;
use super::mirror::LocalJobMirror;
use super::poller::StatusPoller;
use crate::error::{Error, Result};
use crate::host::{ActivityOracle, HostState, Identity, QueueSettings};
use crate::model::JobRecord;
use crate::remote::RemoteCluster;
use crate::store::JobStore;
use crate::telemetry::metrics;

/// Loop timings, budget tiers and the initial verbosity.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay between mirror refreshes.
    pub refresh_interval: Duration,
    /// Delay between admission attempts.
    pub admission_interval: Duration,
    /// Delay between polling passes.
    pub poll_interval: Duration,
    /// Delay between consecutive status checks within one pass.
    pub poll_spacing: Duration,
    pub budget: BudgetPolicy,
    pub verbose: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(250),
            admission_interval: Duration::from_millis(10),
            poll_interval: Duration::from_secs(5),
            poll_spacing: Duration::from_millis(300),
            budget: BudgetPolicy::default(),
            verbose: false,
        }
    }
}

/// Everything the controller consumes from the outside.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn JobStore>,
    pub remote: Arc<dyn RemoteCluster>,
    pub activity: Arc<dyn ActivityOracle>,
    pub settings: Arc<dyn QueueSettings>,
    pub identity: Arc<dyn Identity>,
}

impl Collaborators {
    /// Use one [`HostState`] for activity, settings and identity.
    pub fn with_host(
        store: Arc<dyn JobStore>,
        remote: Arc<dyn RemoteCluster>,
        host: Arc<HostState>,
    ) -> Self {
        Self {
            store,
            remote,
            activity: host.clone(),
            settings: host.clone(),
            identity: host,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LoopKind {
    Refresh,
    Admission,
    Poll,
}

impl LoopKind {
    fn name(self) -> &'static str {
        match self {
            LoopKind::Refresh => "refresh",
            LoopKind::Admission => "admission",
            LoopKind::Poll => "poll",
        }
    }
}

/// One controller instance per running client.
pub struct Controller {
    mirror: Arc<LocalJobMirror>,
    admission: AdmissionController,
    poller: StatusPoller,
    config: ControllerConfig,
    verbosity: Verbosity,
    started: AtomicBool,
}

impl Controller {
    pub fn new(collaborators: Collaborators, config: ControllerConfig) -> Self {
        let Collaborators {
            store,
            remote,
            activity,
            settings,
            identity,
        } = collaborators;

        let verbosity = Verbosity::new(config.verbose);
        let mirror = Arc::new(LocalJobMirror::new(Arc::clone(&store)));

        let admission = AdmissionController::new(
            Arc::clone(&mirror),
            Arc::clone(&store),
            Arc::clone(&remote),
            Arc::clone(&activity),
            settings,
            Arc::clone(&identity),
            config.budget,
            verbosity.clone(),
        );
        let poller = StatusPoller::new(
            Arc::clone(&mirror),
            store,
            remote,
            activity,
            identity,
            config.budget,
            config.poll_spacing,
            verbosity.clone(),
        );

        Self {
            mirror,
            admission,
            poller,
            config,
            verbosity,
            started: AtomicBool::new(false),
        }
    }

    /// Read-only copy of the pending jobs, for display.
    pub async fn cached_pending_jobs(&self) -> Vec<JobRecord> {
        self.mirror.read().await
    }

    pub fn mirror(&self) -> &LocalJobMirror {
        &self.mirror
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity.is_enabled()
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbosity.set(verbose);
    }

    /// Flip verbose diagnostics, returning the new setting.
    pub fn toggle_verbose(&self) -> bool {
        let enabled = self.verbosity.toggle();
        info!(enabled, "verbose controller diagnostics toggled");
        enabled
    }

    /// Spawn the refresh, admission and poll loops.
    ///
    /// Loops run until [`ControllerHandle::shutdown`] is called. A controller
    /// starts at most once.
    pub fn start(self: &Arc<Self>) -> Result<ControllerHandle> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Other("controller already started".to_string()));
        }

        let cancel = CancellationToken::new();
        let tasks = [LoopKind::Refresh, LoopKind::Admission, LoopKind::Poll]
            .into_iter()
            .map(|kind| {
                let this = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { this.run_loop(kind, cancel).await })
            })
            .collect();

        info!(
            refresh_ms = self.config.refresh_interval.as_millis() as u64,
            admission_ms = self.config.admission_interval.as_millis() as u64,
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "controller started"
        );

        Ok(ControllerHandle { cancel, tasks })
    }

    fn period(&self, kind: LoopKind) -> Duration {
        match kind {
            LoopKind::Refresh => self.config.refresh_interval,
            LoopKind::Admission => self.config.admission_interval,
            LoopKind::Poll => self.config.poll_interval,
        }
    }

    async fn run_loop(&self, kind: LoopKind, cancel: CancellationToken) {
        let period = self.period(kind);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Errors end the iteration, never the loop.
            if let Err(e) = self.tick(kind, &cancel).await {
                warn!(control_loop = kind.name(), error = %e, "control loop iteration failed");
                metrics::loop_errors().add(1, &[KeyValue::new("loop", kind.name())]);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        info!(control_loop = kind.name(), "control loop stopped");
    }

    async fn tick(&self, kind: LoopKind, cancel: &CancellationToken) -> Result<()> {
        match kind {
            LoopKind::Refresh => {
                self.mirror.refresh().await?;
            }
            LoopKind::Admission => {
                self.mirror.refresh().await?;
                if let DispatchOutcome::Saturated { active, budget } =
                    self.admission.try_dispatch_next().await?
                {
                    diag!(self.verbosity, active, budget, "budget saturated");
                }
            }
            LoopKind::Poll => {
                let report = self.poller.poll_active(cancel).await?;
                if report.failed > 0 {
                    warn!(
                        checked = report.checked,
                        failed = report.failed,
                        "status checks failed this pass"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Owns the spawned loops. Dropping the handle leaves them running; call
/// [`shutdown`](Self::shutdown) to stop them.
pub struct ControllerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Token observed by every loop. Cancelling it is equivalent to a
    /// shutdown that does not wait.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all loops and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "control loop task ended abnormally");
            }
        }
        info!("controller stopped");
    }
}
