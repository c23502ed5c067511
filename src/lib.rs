//! # wfpatch
//!
//! **wfpatch** is a wait-free live-patching coordinator for multithreaded
//! processes.
//!
//! Application threads register themselves, keep running, and report
//! quiescence from their own loops with a lock-free flag store. A dedicated
//! coordinator thread waits until every active thread is quiescent (first
//! locally, then globally), hands the patch to an external [`PatchEngine`],
//! and tracks every thread onto the new code version. Application threads
//! never wait on the patching machinery; only the patch itself may be delayed.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ app thread 1 │   │ app thread 2 │   │ app thread N │
//!  │ quiescence() │   │ quiescence() │   │ quiescence() │
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         │ atomic flags + version adoption (lock-free)
//!         ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Patcher (runtime context, Arc-shared)                            │
//! │  - ThreadRegistry  (records bucketed by priority, RwLock for      │
//! │                     structure, atomics for flags)                 │
//! │  - PatchDesk       (staged payload/method, one request in flight) │
//! │  - Trigger         (Notify + poll interval + optional OS signal)  │
//! │  - MigrationTracker(tickets, remaining counter)                   │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        ▼                                                   │
//! ┌───────────────────────────────┐                          │
//! │ Coordinator (wf-coordinator)  │── engine.apply() ──► PatchEngine
//! │ Idle → Armed → AwaitingLocal  │── trigger_*_quiescence ──► Hooks
//! │ → AwaitingGlobal → Applying   │                          │
//! │ → Migrating → Idle            │                          │
//! └──────┬────────────────────────┘                          │
//!        │ Publishes Events                                  │
//!        ▼                                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │                  (capacity: Config::bus_capacity)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Patch cycle
//! ```text
//! set_patch(payload) ──► trigger_patch() / signal_patching() / OS signal
//!
//! Idle ─► Armed ─► AwaitingLocal ─► AwaitingGlobal ─► Applying ─┬─► Migrating ─► Idle
//!                  (kick + poll)    (kick + poll)               │   (remaining → 0)
//!                                                               └─► Idle (PatchFailed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------------|---------------------------------------------|
//! | **Runtime**       | Build the context, register threads, report quiescence.           | [`Patcher`], [`PatcherBuilder`]             |
//! | **Registry**      | Id-based thread administration.                                   | [`ThreadRegistry`], [`ThreadId`], [`Priority`] |
//! | **Hooks**         | Application callbacks that kick threads and observe progress.     | [`Hooks`]                                   |
//! | **Engine**        | External code switch-over.                                        | [`PatchEngine`], [`PatchRequest`]           |
//! | **Subscriber API**| Observe runtime events (logging, metrics, custom subscribers).    | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for registry, patch control and startup.             | [`PatchError`], [`RuntimeError`]            |
//! | **Configuration** | Centralize runtime settings.                                      | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports a built-in [`LogWriter`] subscriber that
//!   renders events through [`wf_log!`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use wfpatch::{Config, Patcher, Phase, Priority};
//!
//! let patcher = Patcher::builder(Config::default()).build()?;
//!
//! let worker = {
//!     let patcher = Arc::clone(&patcher);
//!     std::thread::spawn(move || -> Result<(), wfpatch::PatchError> {
//!         patcher.thread_birth("worker")?;
//!         patcher.thread_set_priority(Priority::HIGH)?;
//!         while patcher.active_version() == 0 {
//!             // ... one unit of application work ...
//!             patcher.quiescence();
//!             std::thread::sleep(std::time::Duration::from_millis(1));
//!         }
//!         patcher.quiescence();
//!         patcher.thread_death()
//!     })
//! };
//!
//! patcher.set_patch("libservice.so.2");
//! let version = patcher.trigger_patch()?;
//! assert_eq!(version, 1);
//!
//! worker.join().expect("worker panicked")?;
//! while patcher.phase() != Phase::Idle {
//!     std::thread::sleep(std::time::Duration::from_millis(1));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod core;
pub mod diagnostics;
mod error;
mod events;
mod hooks;
mod patch;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    Config, CycleOutcome, CycleReport, Patcher, PatcherBuilder, Phase, Priority, ThreadId,
    ThreadRecord, ThreadRegistry,
};
pub use diagnostics::wf_time;
pub use error::{ApplyError, PatchError, RuntimeError};
pub use events::{Event, EventKind};
pub use hooks::{Hooks, NoHooks};
pub use patch::{NoopEngine, PatchEngine, PatchMethod, PatchPayload, PatchRequest};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
