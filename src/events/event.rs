//! # Runtime events emitted by the registry and the coordinator.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Thread events**: birth, death, priority and activity changes
//! - **Cycle events**: patch requests, phase changes, kicks, apply result, migration
//! - **Subscriber events**: overflow and panic of event subscribers
//!
//! The [`Event`] struct carries the metadata relevant to its kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use wfpatch::{Event, EventKind, Phase};
//!
//! let ev = Event::new(EventKind::PhaseChanged)
//!     .with_version(3)
//!     .with_phase(Phase::AwaitingLocal);
//!
//! assert_eq!(ev.kind, EventKind::PhaseChanged);
//! assert_eq!(ev.version, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::core::{Phase, Priority, ThreadId, ThreadRecord};
use crate::patch::PatchPayload;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Thread events ===
    /// A thread registered. Sets `thread`, `name`, `priority`.
    ThreadBorn,
    /// A thread unregistered. Sets `thread`, `name`.
    ThreadDied,
    /// A thread changed priority. Sets `thread`, `name`, `priority`.
    PriorityChanged,
    /// A thread rejoined quiescence checks. Sets `thread`, `name`.
    ThreadActivated,
    /// A thread left quiescence checks. Sets `thread`, `name`.
    ThreadDeactivated,

    // === Cycle events ===
    /// A patch request was accepted. Sets `version`, `payload`.
    PatchRequested,
    /// A trigger arrived with nothing staged. Sets `reason`.
    TriggerIgnored,
    /// The coordinator entered a new phase. Sets `phase`, `version`.
    PhaseChanged,
    /// Lagging threads of one priority were kicked.
    /// Sets `phase`, `priority`, `remaining` (lagging threads at that level).
    QuiescenceKicked,
    /// A kick hook reported it could not deliver. Sets `phase`, `priority`.
    KickRejected,
    /// The engine applied the patch. Sets `version`, `remaining` (threads to migrate).
    PatchApplied,
    /// The engine failed. Sets `version`, `reason`.
    PatchFailed,
    /// A thread moved onto the new version. Sets `thread`, `name`, `version`, `remaining`.
    ThreadMigrated,
    /// Every thread migrated; the cycle is over. Sets `version`.
    PatchDone,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed). Sets `name`, `reason`.
    SubscriberOverflow,
    /// Subscriber panicked during event processing. Sets `name`, `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Thread the event is about.
    pub thread: Option<ThreadId>,
    /// Thread or subscriber name.
    pub name: Option<Arc<str>>,
    /// Priority level.
    pub priority: Option<Priority>,
    /// Patch version.
    pub version: Option<u64>,
    /// Remaining threads (to migrate, or lagging at a level).
    pub remaining: Option<usize>,
    /// Coordinator phase.
    pub phase: Option<Phase>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Payload of the request the event is about.
    pub payload: Option<PatchPayload>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            thread: None,
            name: None,
            priority: None,
            version: None,
            remaining: None,
            phase: None,
            reason: None,
            payload: None,
        }
    }

    /// Attaches the id and name of a thread record.
    #[inline]
    pub fn with_thread(mut self, rec: &ThreadRecord) -> Self {
        self.thread = Some(rec.id());
        self.name = Some(rec.name_arc());
        self
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_priority(mut self, p: Priority) -> Self {
        self.priority = Some(p);
        self
    }

    #[inline]
    pub fn with_version(mut self, v: u64) -> Self {
        self.version = Some(v);
        self
    }

    #[inline]
    pub fn with_remaining(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_payload(mut self, payload: PatchPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }
}
