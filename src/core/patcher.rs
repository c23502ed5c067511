//! # Patcher: the runtime context.
//!
//! A [`Patcher`] owns everything one patching runtime needs: the thread
//! registry, the coordinator state, the patch desk, the trigger and the
//! event bus. It is created by [`PatcherBuilder::build`](crate::PatcherBuilder::build),
//! shared as `Arc<Patcher>`, and lives as long as the embedding process
//! needs it (no global singleton).
//!
//! ## Calling-thread API
//! ```text
//! thread_birth(name) ──► registry.register     (binds the calling thread)
//! quiescence()       ──► migrate if behind ──► set local+global flags   (lock-free)
//! thread_death()     ──► registry.unregister   (releases a migration ticket)
//! ```
//!
//! ## Patch control
//! ```text
//! set_patch(payload) / set_patch_method(m) ──► desk (staged)
//! trigger_patch()   ──► desk.arm() ──► Ok(version) + wake coordinator
//!                                  └─► Err(NoPatchArmed | AlreadyArmed)
//! signal_patching() ──► wake coordinator (it arms whatever is staged)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use wfpatch::{Config, Patcher, Phase};
//!
//! let patcher = Patcher::builder(Config::default()).build().expect("runtime");
//!
//! let worker = {
//!     let patcher = Arc::clone(&patcher);
//!     std::thread::spawn(move || {
//!         patcher.thread_birth("worker").expect("registered");
//!         while patcher.active_version() < 1 {
//!             // ... application work ...
//!             patcher.quiescence();
//!             std::thread::sleep(std::time::Duration::from_millis(1));
//!         }
//!         patcher.quiescence();
//!         patcher.thread_death().expect("unregistered");
//!     })
//! };
//!
//! patcher.set_patch("libapp.so.2");
//! assert_eq!(patcher.trigger_patch(), Ok(1));
//! worker.join().unwrap();
//! while patcher.phase() != Phase::Idle {
//!     std::thread::sleep(std::time::Duration::from_millis(1));
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    builder::PatcherBuilder,
    migration::MigrationTracker,
    registry::ThreadRegistry,
    state::{CoordinatorState, CycleReport},
    trigger::Trigger,
};
use crate::core::{Config, Phase, Priority, ThreadId, ThreadRecord};
use crate::error::PatchError;
use crate::events::{Bus, Event, EventKind};
use crate::patch::{PatchDesk, PatchMethod, PatchPayload};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::wf_log;

/// Wait-free live-patching runtime context.
pub struct Patcher {
    pub(crate) cfg: Config,
    pub(crate) registry: Arc<ThreadRegistry>,
    pub(crate) state: Arc<CoordinatorState>,
    pub(crate) tracker: Arc<MigrationTracker>,
    pub(crate) desk: Arc<PatchDesk>,
    pub(crate) trigger: Arc<Trigger>,
    pub(crate) bus: Bus,
    pub(crate) token: CancellationToken,
}

impl Patcher {
    /// Starts building a runtime with `cfg`.
    pub fn builder(cfg: Config) -> PatcherBuilder {
        PatcherBuilder::new(cfg)
    }

    /// Settings the runtime was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The thread registry, for id-based administration.
    pub fn registry(&self) -> &Arc<ThreadRegistry> {
        &self.registry
    }

    // ---------------------------
    // Thread lifecycle
    // ---------------------------

    /// Registers the calling thread.
    pub fn thread_birth(&self, name: &str) -> Result<ThreadId, PatchError> {
        self.registry.register(name)
    }

    /// Unregisters the calling thread.
    ///
    /// A second call fails with `UnknownThread` naming the old id.
    pub fn thread_death(&self) -> Result<(), PatchError> {
        let id = self.local_id()?;
        self.registry.unregister(id)
    }

    /// Id of the calling thread, if it is registered.
    pub fn local_thread_id(&self) -> Option<ThreadId> {
        self.registry.local().map(|r| r.id())
    }

    // ---------------------------
    // Quiescence reporting (lock-free)
    // ---------------------------

    /// Reports local quiescence for the calling thread and returns the
    /// current local flag (`false` if the thread is not registered).
    pub fn local_quiescence(&self) -> bool {
        self.report(true, false, |rec, epoch| rec.is_local_quiescent(epoch))
    }

    /// Reports global quiescence for the calling thread and returns the
    /// current global flag.
    pub fn global_quiescence(&self) -> bool {
        self.report(false, true, |rec, epoch| rec.is_global_quiescent(epoch))
    }

    /// Reports both and returns whether both flags are set.
    pub fn quiescence(&self) -> bool {
        self.report(true, true, |rec, epoch| {
            rec.is_local_quiescent(epoch) && rec.is_global_quiescent(epoch)
        })
    }

    fn report(&self, local: bool, global: bool, read: impl Fn(&ThreadRecord, u64) -> bool) -> bool {
        match self.registry.local() {
            Some(rec) => {
                self.registry.report(&rec, local, global);
                read(&rec, self.state.epoch())
            }
            None => false,
        }
    }

    // ---------------------------
    // Activity and priority (calling thread)
    // ---------------------------

    /// Makes the calling thread count in quiescence checks again.
    pub fn thread_activate(&self) -> Result<(), PatchError> {
        self.registry.activate(self.local_id()?)
    }

    /// Exempts the calling thread from quiescence checks, e.g. before it
    /// blocks outside the patchable code.
    pub fn thread_deactivate(&self) -> Result<(), PatchError> {
        self.registry.deactivate(self.local_id()?)
    }

    /// Moves the calling thread to `priority`; kicks address it by that level.
    pub fn thread_set_priority(&self, priority: Priority) -> Result<(), PatchError> {
        self.registry.set_priority(self.local_id()?, priority)
    }

    fn local_id(&self) -> Result<ThreadId, PatchError> {
        self.registry.calling_id()
    }

    // ---------------------------
    // Patch control
    // ---------------------------

    /// Stages the payload for the next request.
    pub fn set_patch(&self, payload: impl Into<PatchPayload>) {
        self.desk.stage_payload(payload.into());
    }

    /// Sets the engine method for subsequent requests.
    pub fn set_patch_method(&self, method: PatchMethod) {
        self.desk.stage_method(method);
    }

    /// Arms the staged payload and wakes the coordinator.
    ///
    /// Returns the version the request was armed as. With nothing staged
    /// the trigger is ignored (logged) and `NoPatchArmed` is returned; while
    /// a cycle is in flight `AlreadyArmed` is returned.
    pub fn trigger_patch(&self) -> Result<u64, PatchError> {
        match self.desk.arm() {
            Ok(req) => {
                self.trigger.kick();
                Ok(req.version())
            }
            Err(err) => {
                if err == PatchError::NoPatchArmed {
                    wf_log!("trigger ignored: {err}");
                    self.bus.publish(
                        Event::new(EventKind::TriggerIgnored).with_reason(err.as_label()),
                    );
                }
                Err(err)
            }
        }
    }

    /// Asynchronous trigger: wakes the coordinator, which arms whatever is
    /// staged. Safe to call from any thread, any number of times.
    pub fn signal_patching(&self) {
        self.trigger.kick();
    }

    // ---------------------------
    // Diagnostics
    // ---------------------------

    /// Current coordinator phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Threads still expected to migrate in the current cycle.
    pub fn remaining(&self) -> usize {
        self.tracker.remaining()
    }

    /// Latest version threads migrate onto (0 before the first patch).
    pub fn active_version(&self) -> u64 {
        self.state.active_version()
    }

    /// Version of the request in flight, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.desk.in_flight()
    }

    /// Report of the most recently finished cycle.
    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.state.last_cycle()
    }

    /// Receiver for runtime events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops the coordinator loop. An in-flight cycle is abandoned where it is.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Drop for Patcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled.
///
/// Must be called from inside the coordinator runtime.
pub(crate) fn subscriber_listener(
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Bus,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        wf_log!("event listener lagged, skipped {n} events");
                        continue;
                    }
                }
            }
        }
        set.shutdown().await;
    })
}
