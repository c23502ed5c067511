//! # Coordinator: the patch-cycle actor.
//!
//! Owns the state machine and is the only writer of [`CoordinatorState`].
//! Runs on the `wf-coordinator` thread's current-thread runtime.
//!
//! ## Cycle
//! ```text
//! loop {
//!   ├─► wait: trigger notified | patch signal | cancelled
//!   ├─► pick up armed request (or arm the staged one; none → TriggerIgnored)
//!   ├─► Armed
//!   ├─► AwaitingLocal:  scan ─► kick lagging levels (high → low) ─► sleep ─► scan ...
//!   ├─► AwaitingGlobal: same, requiring local && global
//!   ├─► Applying:       engine.apply() on a blocking worker
//!   │       ├─ Err ─► PatchFailed ─► finish(Failed) ─► Idle
//!   │       └─ Ok  ─► hooks.patch_applied()
//!   ├─► Migrating:      tickets to active threads ─► publish version ─► wait remaining == 0
//!   ├─► hooks.patch_done()
//!   ├─► finish(Applied): new epoch (flags reset), report, Idle
//!   └─► wake left over from the cycle? pick up again, silently if nothing is staged
//! }
//! ```
//!
//! ## Rules
//! - One request at a time; phases only move forward within a cycle.
//! - No internal timeout: a thread that never reports keeps the cycle in its
//!   polling phase. Only cancellation leaves a wait early.
//! - Hooks run with no registry lock held.

use std::sync::Arc;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::core::migration::MigrationTracker;
use crate::core::registry::{Quiescence, ThreadRegistry};
use crate::core::state::{CoordinatorState, CycleOutcome, CycleReport};
use crate::core::trigger::{SignalListener, Trigger};
use crate::core::{Phase, Priority};
use crate::diagnostics::wf_time;
use crate::error::PatchError;
use crate::events::{Bus, Event, EventKind};
use crate::hooks::Hooks;
use crate::patch::{PatchDesk, PatchEngine, PatchRequest};
use crate::wf_log;

/// Returned by waits that were cut short by cancellation.
struct Cancelled;

pub(crate) struct Coordinator {
    pub(crate) registry: Arc<ThreadRegistry>,
    pub(crate) state: Arc<CoordinatorState>,
    pub(crate) tracker: Arc<MigrationTracker>,
    pub(crate) desk: Arc<PatchDesk>,
    pub(crate) trigger: Arc<Trigger>,
    pub(crate) hooks: Arc<dyn Hooks>,
    pub(crate) engine: Arc<dyn PatchEngine>,
    pub(crate) bus: Bus,
}

impl Coordinator {
    /// Runs cycles until `token` is cancelled.
    pub(crate) async fn run(self, mut signals: SignalListener, token: CancellationToken) {
        let mut leftover = false;
        loop {
            let source = if leftover {
                "trigger"
            } else {
                select! {
                    _ = token.cancelled() => break,
                    _ = self.trigger.notified() => "trigger",
                    _ = signals.recv() => "signal",
                }
            };
            let Some(req) = self.pick_up(source, leftover) else {
                leftover = false;
                continue;
            };
            if self.cycle(req, &token).await.is_err() {
                break;
            }
            // Wakes sent while the cycle ran were mostly meant for it.
            leftover = !token.is_cancelled() && self.trigger.take_pending();
        }
    }

    /// Takes the armed request, or arms the staged payload.
    ///
    /// A `quiet` pick-up with nothing staged is dropped without a
    /// `TriggerIgnored` report.
    fn pick_up(&self, source: &'static str, quiet: bool) -> Option<PatchRequest> {
        if let Some(req) = self.desk.take_armed() {
            return Some(req);
        }
        match self.desk.arm() {
            Ok(req) => {
                self.desk.take_armed();
                Some(req)
            }
            Err(err) if quiet && err == PatchError::NoPatchArmed => None,
            Err(err) => {
                wf_log!("{source} ignored: {err}");
                self.bus.publish(
                    Event::new(EventKind::TriggerIgnored).with_reason(err.as_label()),
                );
                None
            }
        }
    }

    async fn cycle(&self, req: PatchRequest, token: &CancellationToken) -> Result<(), Cancelled> {
        let started_at = wf_time();
        let version = req.version();

        self.enter(Phase::Armed, version);
        self.bus.publish(
            Event::new(EventKind::PatchRequested)
                .with_version(version)
                .with_payload(req.payload().clone()),
        );

        self.enter(Phase::AwaitingLocal, version);
        self.await_quiescence(Quiescence::Local, token).await?;

        self.enter(Phase::AwaitingGlobal, version);
        self.await_quiescence(Quiescence::Global, token).await?;

        self.enter(Phase::Applying, version);
        if let Err(reason) = self.apply(&req).await {
            let err = PatchError::ApplyFailed {
                version,
                reason: reason.clone(),
            };
            wf_log!("{err}");
            self.bus.publish(
                Event::new(EventKind::PatchFailed)
                    .with_version(version)
                    .with_reason(reason.as_str()),
            );
            self.finish(req, CycleOutcome::Failed(reason), started_at, None);
            return Ok(());
        }
        let applied_at = wf_time();
        self.hooks.patch_applied(&req);

        self.enter(Phase::Migrating, version);
        let to_migrate = self.registry.begin_migration(version);
        self.state.publish_version(version);
        self.bus.publish(
            Event::new(EventKind::PatchApplied)
                .with_version(version)
                .with_remaining(to_migrate),
        );
        self.await_migration(token).await?;

        self.hooks.patch_done(&req);
        self.bus
            .publish(Event::new(EventKind::PatchDone).with_version(version));
        self.finish(req, CycleOutcome::Applied, started_at, Some(applied_at));
        Ok(())
    }

    /// Polls until no active thread lags behind `check`, kicking the
    /// lagging priority levels on every scan.
    async fn await_quiescence(
        &self,
        check: Quiescence,
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let phase = self.state.phase();
        let mut last: Vec<(Priority, usize)> = Vec::new();

        loop {
            let lagging = self.registry.lagging(self.state.epoch(), check);
            if lagging.is_empty() {
                return Ok(());
            }

            let changed = lagging != last;
            for &(priority, count) in &lagging {
                let delivered = match check {
                    Quiescence::Local => self.hooks.trigger_local_quiescence(priority),
                    Quiescence::Global => self.hooks.trigger_global_quiescence(priority),
                };
                // Report only when the picture changes; kicks repeat every scan.
                if changed {
                    self.bus.publish(
                        Event::new(EventKind::QuiescenceKicked)
                            .with_phase(phase)
                            .with_priority(priority)
                            .with_remaining(count),
                    );
                }
                if !delivered && changed {
                    self.bus.publish(
                        Event::new(EventKind::KickRejected)
                            .with_phase(phase)
                            .with_priority(priority),
                    );
                }
            }
            last = lagging;

            select! {
                _ = token.cancelled() => return Err(Cancelled),
                _ = self.trigger.tick() => {}
            }
        }
    }

    async fn await_migration(&self, token: &CancellationToken) -> Result<(), Cancelled> {
        while !self.tracker.is_settled() {
            select! {
                _ = token.cancelled() => return Err(Cancelled),
                _ = self.tracker.drained() => {}
                _ = self.trigger.tick() => {}
            }
        }
        Ok(())
    }

    /// Runs the engine on a blocking worker; a panic counts as failure.
    async fn apply(&self, req: &PatchRequest) -> Result<(), String> {
        let engine = Arc::clone(&self.engine);
        let req = req.clone();
        match tokio::task::spawn_blocking(move || engine.apply(&req)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.reason().to_string()),
            Err(je) if je.is_panic() => Err("engine panicked".to_string()),
            Err(_) => Err("engine cancelled".to_string()),
        }
    }

    fn finish(
        &self,
        request: PatchRequest,
        outcome: CycleOutcome,
        started_at: f64,
        applied_at: Option<f64>,
    ) {
        let version = request.version();
        self.tracker.end();
        self.state.next_epoch();
        self.state.record_cycle(CycleReport {
            request,
            outcome,
            started_at,
            applied_at,
            finished_at: wf_time(),
        });
        self.desk.finish(version);
        self.enter(Phase::Idle, version);
    }

    fn enter(&self, phase: Phase, version: u64) {
        self.state.set_phase(phase);
        self.bus.publish(
            Event::new(EventKind::PhaseChanged)
                .with_phase(phase)
                .with_version(version),
        );
    }
}
