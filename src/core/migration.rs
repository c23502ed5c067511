//! # Migration tracker.
//!
//! Counts threads that still have to move onto a freshly applied version.
//!
//! ```text
//! coordinator: begin(v, active)  ─► remaining = |active|, ticket(v) for each
//! thread:      redeem(rec)       ─► CAS ticket v → 0, remaining -= 1, thread_migrated(remaining)
//! coordinator: wait until settled     ─► end()
//! ```
//!
//! `remaining` drops before the hook runs; `unsettled` drops after it, so the
//! coordinator never reports the cycle done while a `thread_migrated` call is
//! still running.
//!
//! A ticket is redeemed at most once, so a thread reporting migration twice
//! cannot decrement twice. Threads that die or deactivate with a ticket in
//! hand redeem it on their way out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::core::ThreadRecord;
use crate::events::{Bus, Event, EventKind};
use crate::hooks::Hooks;

pub(crate) struct MigrationTracker {
    cycle: AtomicU64,
    remaining: AtomicUsize,
    unsettled: AtomicUsize,
    done: Notify,
    hooks: Arc<dyn Hooks>,
    bus: Bus,
}

impl MigrationTracker {
    pub(crate) fn new(hooks: Arc<dyn Hooks>, bus: Bus) -> Self {
        Self {
            cycle: AtomicU64::new(0),
            remaining: AtomicUsize::new(0),
            unsettled: AtomicUsize::new(0),
            done: Notify::new(),
            hooks,
            bus,
        }
    }

    /// Starts counting for `version`. Must run under the registry write lock
    /// so no ticket holder can leave between the count and the grants.
    pub(crate) fn begin(&self, version: u64, records: &[Arc<ThreadRecord>]) -> usize {
        self.remaining.store(records.len(), Ordering::Release);
        self.unsettled.store(records.len(), Ordering::Release);
        self.cycle.store(version, Ordering::Release);
        for rec in records {
            rec.grant_ticket(version);
        }
        records.len()
    }

    /// Redeems `rec`'s ticket for the current cycle, if it holds one.
    pub(crate) fn redeem(&self, rec: &ThreadRecord) -> bool {
        let cycle = self.cycle.load(Ordering::Acquire);
        if cycle == 0 || rec.ticket() != cycle || !rec.redeem_ticket(cycle) {
            return false;
        }
        let left = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;

        self.hooks.thread_migrated(left);
        self.bus.publish(
            Event::new(EventKind::ThreadMigrated)
                .with_thread(rec)
                .with_version(cycle)
                .with_remaining(left),
        );
        if self.unsettled.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_one();
        }
        true
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Every ticket of the current cycle was redeemed and its hook returned.
    pub(crate) fn is_settled(&self) -> bool {
        self.unsettled.load(Ordering::Acquire) == 0
    }

    /// Resolves after the last redeem settled (permit is kept
    /// if nobody was waiting).
    pub(crate) async fn drained(&self) {
        self.done.notified().await
    }

    pub(crate) fn end(&self) {
        self.cycle.store(0, Ordering::Release);
        self.remaining.store(0, Ordering::Release);
        self.unsettled.store(0, Ordering::Release);
    }
}
