//! # Per-thread record.
//!
//! A [`ThreadRecord`] is shared between the owning application thread, the
//! registry and the coordinator. Every field is word-sized and atomic, and
//! every field has a single writer:
//!
//! | field            | writer                                   |
//! |------------------|------------------------------------------|
//! | `local`/`global` | owning thread                            |
//! | `version`        | owning thread (initialized at birth)     |
//! | `priority`       | registry, under its write lock           |
//! | `active`         | registry, under its write lock           |
//! | `ticket`         | coordinator sets, CAS redeems            |
//!
//! Quiescence flags hold the cycle epoch they were reported in; a flag is
//! set only while it equals the coordinator's current epoch.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Process-unique thread identifier. Never reused by a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread priority level. Higher levels are scanned (and kicked) first.
///
/// The number of valid levels is [`Config::amount_priorities`](crate::Config::amount_priorities);
/// the four named constants match the default of 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u8);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const MEDIUM: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const CRITICAL: Priority = Priority(3);

    /// Wraps a raw level; validity is checked by the registry.
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// The raw level.
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Priority::LOW => f.write_str("low"),
            Priority::MEDIUM => f.write_str("medium"),
            Priority::HIGH => f.write_str("high"),
            Priority::CRITICAL => f.write_str("critical"),
            Priority(n) => write!(f, "p{n}"),
        }
    }
}

/// Live state of one registered thread.
#[derive(Debug)]
pub struct ThreadRecord {
    id: ThreadId,
    name: Arc<str>,
    priority: AtomicU8,
    active: AtomicBool,
    local: AtomicU64,
    global: AtomicU64,
    version: AtomicU64,
    ticket: AtomicU64,
}

impl ThreadRecord {
    pub(crate) fn new(id: ThreadId, name: Arc<str>, version: u64) -> Self {
        Self {
            id,
            name,
            priority: AtomicU8::new(Priority::default().level()),
            active: AtomicBool::new(true),
            local: AtomicU64::new(0),
            global: AtomicU64::new(0),
            version: AtomicU64::new(version),
            ticket: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn priority(&self) -> Priority {
        Priority(self.priority.load(Ordering::Acquire))
    }

    pub(crate) fn set_priority(&self, p: Priority) {
        self.priority.store(p.level(), Ordering::Release);
    }

    /// Whether the thread takes part in quiescence checks.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, on: bool) {
        self.active.store(on, Ordering::Release);
    }

    /// Patch version this thread last adopted.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn adopt_version(&self, v: u64) {
        self.version.store(v, Ordering::Release);
    }

    pub(crate) fn mark_local(&self, epoch: u64) {
        self.local.store(epoch, Ordering::Release);
    }

    pub(crate) fn mark_global(&self, epoch: u64) {
        self.global.store(epoch, Ordering::Release);
    }

    pub(crate) fn is_local_quiescent(&self, epoch: u64) -> bool {
        self.local.load(Ordering::Acquire) == epoch
    }

    pub(crate) fn is_global_quiescent(&self, epoch: u64) -> bool {
        self.global.load(Ordering::Acquire) == epoch
    }

    pub(crate) fn grant_ticket(&self, cycle: u64) {
        self.ticket.store(cycle, Ordering::Release);
    }

    /// Consumes the ticket for `cycle`; true exactly once per grant.
    pub(crate) fn redeem_ticket(&self, cycle: u64) -> bool {
        cycle != 0
            && self
                .ticket
                .compare_exchange(cycle, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ThreadRecord {
        ThreadRecord::new(ThreadId::new(1), Arc::from("worker"), 0)
    }

    #[test]
    fn new_record_is_active_and_not_quiescent() {
        let r = record();
        assert!(r.is_active());
        assert_eq!(r.priority(), Priority::LOW);
        assert!(!r.is_local_quiescent(1));
        assert!(!r.is_global_quiescent(1));
    }

    #[test]
    fn flags_expire_with_epoch() {
        let r = record();
        r.mark_local(1);
        r.mark_local(1);
        assert!(r.is_local_quiescent(1));
        assert!(!r.is_local_quiescent(2));
        assert!(!r.is_global_quiescent(1));
    }

    #[test]
    fn ticket_redeems_once() {
        let r = record();
        r.grant_ticket(5);
        assert!(!r.redeem_ticket(4));
        assert!(r.redeem_ticket(5));
        assert!(!r.redeem_ticket(5));
        assert!(!r.redeem_ticket(0));
    }

    #[test]
    fn priority_names() {
        assert_eq!(Priority::CRITICAL.to_string(), "critical");
        assert_eq!(Priority::new(7).to_string(), "p7");
        assert!(Priority::HIGH > Priority::MEDIUM);
    }
}
