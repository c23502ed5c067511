//! # Thread registry.
//!
//! Tracks every application thread known to a [`Patcher`](crate::Patcher).
//!
//! ## Architecture
//! ```text
//! register(name) ──► write lock ──► by_id[id] + buckets[LOW]   ──► bind calling thread
//! set_priority   ──► write lock ──► move between buckets
//! (de)activate   ──► write lock ──► flip `active`
//! unregister     ──► unbind ──► write lock ──► remove ──► redeem migration ticket
//!
//! mark_*_quiescent ──► thread-local record ──► atomic store  (no lock)
//!
//! coordinator scan ──► read lock ──► buckets[max..=0] (highest priority first)
//! ```
//!
//! ## Rules
//! - Structural operations are serialized by one short `RwLock`; the
//!   coordinator scan takes the read side.
//! - Quiescence flags are written only by the owning thread; the calling
//!   thread's record is found through a thread-local binding, never through
//!   the lock.
//! - Ids come from a monotonic counter and are never reused.
//! - A thread that exits without unregistering is unregistered when its
//!   thread-local binding is destroyed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::core::migration::MigrationTracker;
use crate::core::state::CoordinatorState;
use crate::core::{Config, Priority, ThreadId, ThreadRecord};
use crate::error::PatchError;
use crate::events::{Bus, Event, EventKind};

static REGISTRY_UID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static BINDINGS: RefCell<Vec<Binding>> = const { RefCell::new(Vec::new()) };
}

/// Ties the calling OS thread to its record in one registry.
///
/// After `unregister` the binding stays behind without a record, so a
/// repeated unregister from the same thread can still name the old id.
struct Binding {
    uid: u64,
    registry: Weak<ThreadRegistry>,
    id: ThreadId,
    record: Option<Arc<ThreadRecord>>,
}

impl Binding {
    fn is_orphaned(&self) -> bool {
        self.registry.strong_count() == 0
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let Some(rec) = self.record.take() {
            if let Some(reg) = self.registry.upgrade() {
                reg.detach(&rec);
            }
        }
    }
}

/// Runs `f` on the calling thread's bindings after dropping the ones whose
/// registry is gone. `None` while thread-local storage is being torn down.
fn with_bindings<R>(f: impl FnOnce(&mut Vec<Binding>) -> R) -> Option<R> {
    BINDINGS
        .try_with(|b| {
            let mut b = b.borrow_mut();
            // Orphans cannot upgrade, so dropping them never re-enters BINDINGS.
            b.retain(|x| !x.is_orphaned());
            f(&mut b)
        })
        .ok()
}

/// Which flags a scan requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quiescence {
    Local,
    /// Local and global.
    Global,
}

impl Quiescence {
    fn satisfied(self, rec: &ThreadRecord, epoch: u64) -> bool {
        match self {
            Quiescence::Local => rec.is_local_quiescent(epoch),
            Quiescence::Global => rec.is_local_quiescent(epoch) && rec.is_global_quiescent(epoch),
        }
    }
}

struct Inner {
    by_id: HashMap<ThreadId, Arc<ThreadRecord>>,
    /// One bucket per priority level.
    buckets: Vec<Vec<Arc<ThreadRecord>>>,
}

impl Inner {
    fn unlink(&mut self, rec: &ThreadRecord) {
        let bucket = &mut self.buckets[rec.priority().level() as usize];
        if let Some(pos) = bucket.iter().position(|r| r.id() == rec.id()) {
            bucket.swap_remove(pos);
        }
    }
}

/// Registry of application threads, bucketed by priority.
pub struct ThreadRegistry {
    uid: u64,
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    amount_priorities: u8,
    limit: Option<usize>,
    state: Arc<CoordinatorState>,
    tracker: Arc<MigrationTracker>,
    bus: Bus,
}

impl ThreadRegistry {
    pub(crate) fn new(
        cfg: &Config,
        state: Arc<CoordinatorState>,
        tracker: Arc<MigrationTracker>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            uid: REGISTRY_UID.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(Inner {
                by_id: HashMap::new(),
                buckets: vec![Vec::new(); cfg.amount_priorities as usize],
            }),
            next_id: AtomicU64::new(1),
            amount_priorities: cfg.amount_priorities,
            limit: cfg.thread_limit(),
            state,
            tracker,
            bus,
        })
    }

    /// Registers the calling thread under `name` with default priority,
    /// active, and both quiescence flags clear.
    pub fn register(self: &Arc<Self>, name: &str) -> Result<ThreadId, PatchError> {
        if let Some(rec) = self.local() {
            return Err(PatchError::AlreadyRegistered { id: rec.id() });
        }

        let rec = {
            let mut inner = self.inner.write();
            if let Some(max) = self.limit {
                if inner.by_id.len() >= max {
                    return Err(PatchError::CapacityExceeded { max });
                }
            }
            let id = ThreadId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let rec = Arc::new(ThreadRecord::new(
                id,
                Arc::from(name),
                self.state.active_version(),
            ));
            inner.by_id.insert(id, Arc::clone(&rec));
            inner.buckets[rec.priority().level() as usize].push(Arc::clone(&rec));
            rec
        };

        let bound = with_bindings(|b| {
            match b.iter_mut().find(|x| x.uid == self.uid) {
                Some(slot) => {
                    slot.id = rec.id();
                    slot.record = Some(Arc::clone(&rec));
                }
                None => b.push(Binding {
                    uid: self.uid,
                    registry: Arc::downgrade(self),
                    id: rec.id(),
                    record: Some(Arc::clone(&rec)),
                }),
            }
        });
        if bound.is_none() {
            // The thread is exiting; it cannot report for this record.
            self.detach(&rec);
            return Err(PatchError::NotRegistered);
        }
        self.bus.publish(
            Event::new(EventKind::ThreadBorn)
                .with_thread(&rec)
                .with_priority(rec.priority()),
        );
        Ok(rec.id())
    }

    /// Unregisters `id`, which must be the calling thread's own id.
    pub fn unregister(&self, id: ThreadId) -> Result<(), PatchError> {
        let rec = with_bindings(|b| {
            b.iter_mut()
                .find(|x| x.uid == self.uid && x.id == id)
                .and_then(|x| x.record.take())
        })
        .flatten();
        match rec {
            // Detach outside the borrow; the bus and hooks may run here.
            Some(rec) => {
                self.detach(&rec);
                Ok(())
            }
            None => Err(PatchError::UnknownThread { id }),
        }
    }

    /// Moves `id` to priority `level`.
    pub fn set_priority(&self, id: ThreadId, level: Priority) -> Result<(), PatchError> {
        if level.level() >= self.amount_priorities {
            return Err(PatchError::InvalidPriority {
                level: level.level(),
                amount: self.amount_priorities,
            });
        }
        let rec = {
            let mut inner = self.inner.write();
            let rec = inner
                .by_id
                .get(&id)
                .cloned()
                .ok_or(PatchError::UnknownThread { id })?;
            if rec.priority() != level {
                inner.unlink(&rec);
                rec.set_priority(level);
                inner.buckets[level.level() as usize].push(Arc::clone(&rec));
            }
            rec
        };
        self.bus.publish(
            Event::new(EventKind::PriorityChanged)
                .with_thread(&rec)
                .with_priority(level),
        );
        Ok(())
    }

    /// Makes `id` take part in quiescence checks again.
    pub fn activate(&self, id: ThreadId) -> Result<(), PatchError> {
        self.set_activity(id, true)
    }

    /// Exempts `id` from quiescence checks. Its flags are left untouched;
    /// scans treat it as vacuously quiescent.
    pub fn deactivate(&self, id: ThreadId) -> Result<(), PatchError> {
        self.set_activity(id, false)
    }

    fn set_activity(&self, id: ThreadId, on: bool) -> Result<(), PatchError> {
        let rec = {
            let inner = self.inner.write();
            let rec = inner
                .by_id
                .get(&id)
                .cloned()
                .ok_or(PatchError::UnknownThread { id })?;
            rec.set_active(on);
            rec
        };
        let kind = if on {
            EventKind::ThreadActivated
        } else {
            self.tracker.redeem(&rec);
            EventKind::ThreadDeactivated
        };
        self.bus.publish(Event::new(kind).with_thread(&rec));
        Ok(())
    }

    /// Reports local quiescence for the calling thread, which must own `id`.
    pub fn mark_local_quiescent(&self, id: ThreadId) -> Result<(), PatchError> {
        let rec = self.owned(id)?;
        self.report(&rec, true, false);
        Ok(())
    }

    /// Reports global quiescence for the calling thread, which must own `id`.
    pub fn mark_global_quiescent(&self, id: ThreadId) -> Result<(), PatchError> {
        let rec = self.owned(id)?;
        self.report(&rec, false, true);
        Ok(())
    }

    /// Record of the calling thread, if it is registered here.
    pub fn local(&self) -> Option<Arc<ThreadRecord>> {
        with_bindings(|b| {
            b.iter()
                .find(|x| x.uid == self.uid)
                .and_then(|x| x.record.clone())
        })
        .flatten()
    }

    /// Id of the calling thread.
    ///
    /// A thread that unregistered keeps its old id here and gets
    /// `UnknownThread`; one that never registered gets `NotRegistered`.
    pub(crate) fn calling_id(&self) -> Result<ThreadId, PatchError> {
        let found = with_bindings(|b| {
            b.iter()
                .find(|x| x.uid == self.uid)
                .map(|x| (x.id, x.record.is_some()))
        })
        .flatten();
        match found {
            Some((id, true)) => Ok(id),
            Some((id, false)) => Err(PatchError::UnknownThread { id }),
            None => Err(PatchError::NotRegistered),
        }
    }

    /// Record for `id`, if registered.
    pub fn get(&self, id: ThreadId) -> Option<Arc<ThreadRecord>> {
        self.inner.read().by_id.get(&id).cloned()
    }

    /// All records, sorted by id.
    pub fn snapshot(&self) -> Vec<Arc<ThreadRecord>> {
        let inner = self.inner.read();
        let mut all: Vec<_> = inner.by_id.values().cloned().collect();
        all.sort_unstable_by_key(|r| r.id());
        all
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    pub fn amount_priorities(&self) -> u8 {
        self.amount_priorities
    }

    /// Migrates `rec` if a newer version is active, then sets the requested flags.
    pub(crate) fn report(&self, rec: &ThreadRecord, local: bool, global: bool) {
        let version = self.state.active_version();
        if rec.version() < version {
            rec.adopt_version(version);
            self.tracker.redeem(rec);
        }
        let epoch = self.state.epoch();
        if local {
            rec.mark_local(epoch);
        }
        if global {
            rec.mark_global(epoch);
        }
    }

    /// Active threads that still miss `check` in `epoch`, per priority,
    /// highest priority first.
    pub(crate) fn lagging(&self, epoch: u64, check: Quiescence) -> Vec<(Priority, usize)> {
        let inner = self.inner.read();
        inner
            .buckets
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(level, bucket)| {
                let n = bucket
                    .iter()
                    .filter(|r| r.is_active() && !check.satisfied(r, epoch))
                    .count();
                (n > 0).then(|| (Priority::new(level as u8), n))
            })
            .collect()
    }

    /// Hands a migration ticket for `version` to every active thread.
    pub(crate) fn begin_migration(&self, version: u64) -> usize {
        let inner = self.inner.write();
        let active: Vec<_> = inner
            .by_id
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        self.tracker.begin(version, &active)
    }

    fn owned(&self, id: ThreadId) -> Result<Arc<ThreadRecord>, PatchError> {
        self.local()
            .filter(|r| r.id() == id)
            .ok_or(PatchError::UnknownThread { id })
    }

    fn detach(&self, rec: &ThreadRecord) {
        let removed = {
            let mut inner = self.inner.write();
            let removed = inner.by_id.remove(&rec.id()).is_some();
            if removed {
                inner.unlink(rec);
            }
            removed
        };
        if removed {
            self.tracker.redeem(rec);
            self.bus
                .publish(Event::new(EventKind::ThreadDied).with_thread(rec));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoHooks;
    use std::collections::HashSet;

    fn bound_count() -> usize {
        BINDINGS.with(|b| b.borrow().len())
    }

    fn registry(cfg: Config) -> Arc<ThreadRegistry> {
        let bus = Bus::new(64);
        let tracker = Arc::new(MigrationTracker::new(Arc::new(NoHooks), bus.clone()));
        ThreadRegistry::new(&cfg, Arc::new(CoordinatorState::new()), tracker, bus)
    }

    #[test]
    fn register_defaults() {
        let reg = registry(Config::default());
        let id = reg.register("main").expect("registered");
        let rec = reg.get(id).expect("record");
        assert_eq!(rec.name(), "main");
        assert_eq!(rec.priority(), Priority::LOW);
        assert!(rec.is_active());
        assert_eq!(reg.local().map(|r| r.id()), Some(id));
        assert_eq!(
            reg.lagging(1, Quiescence::Local),
            vec![(Priority::LOW, 1)]
        );
    }

    #[test]
    fn double_register_and_double_unregister_fail() {
        let reg = registry(Config::default());
        let id = reg.register("main").expect("registered");
        assert_eq!(
            reg.register("again"),
            Err(PatchError::AlreadyRegistered { id })
        );
        assert!(reg.unregister(id).is_ok());
        assert_eq!(reg.unregister(id), Err(PatchError::UnknownThread { id }));
        assert!(reg.is_empty());
        assert!(reg.local().is_none());
    }

    #[test]
    fn unregistered_thread_keeps_its_old_id_until_it_registers_again() {
        let reg = registry(Config::default());
        assert_eq!(reg.calling_id(), Err(PatchError::NotRegistered));

        let first = reg.register("main").expect("registered");
        assert_eq!(reg.calling_id(), Ok(first));
        reg.unregister(first).expect("unregistered");
        assert_eq!(
            reg.calling_id(),
            Err(PatchError::UnknownThread { id: first })
        );

        let second = reg.register("main").expect("registered again");
        assert_ne!(first, second);
        assert_eq!(reg.calling_id(), Ok(second));
        assert_eq!(
            reg.unregister(first),
            Err(PatchError::UnknownThread { id: first })
        );
        assert_eq!(bound_count(), 1);
    }

    #[test]
    fn bindings_of_dropped_registries_are_pruned() {
        let reg = registry(Config::default());
        reg.register("main").expect("registered");
        drop(reg);
        // The dead binding lingers until the next lookup on this thread.
        assert_eq!(bound_count(), 1);

        let reg = registry(Config::default());
        assert!(reg.local().is_none());
        assert_eq!(bound_count(), 0);

        reg.register("main").expect("registered");
        drop(reg);
        let reg = registry(Config::default());
        reg.register("main").expect("registered");
        assert_eq!(bound_count(), 1);
    }

    #[test]
    fn unregister_of_foreign_id_fails() {
        let reg = registry(Config::default());
        let other = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                reg.register("other").expect("registered")
            })
            .join()
            .expect("join")
        };
        // The foreign thread exited; its binding was destroyed with it.
        assert!(reg.get(other).is_none());

        let mine = reg.register("mine").expect("registered");
        assert_ne!(mine, other);
        assert_eq!(
            reg.unregister(other),
            Err(PatchError::UnknownThread { id: other })
        );
        assert_eq!(
            reg.mark_local_quiescent(other),
            Err(PatchError::UnknownThread { id: other })
        );
    }

    #[test]
    fn capacity_is_enforced() {
        let reg = registry(Config {
            max_threads: 1,
            ..Config::default()
        });
        reg.register("main").expect("registered");
        let r = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || reg.register("second"))
                .join()
                .expect("join")
        };
        assert_eq!(r, Err(PatchError::CapacityExceeded { max: 1 }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn invalid_priority_leaves_state_unchanged() {
        let reg = registry(Config::default());
        let id = reg.register("main").expect("registered");
        assert_eq!(
            reg.set_priority(id, Priority::new(4)),
            Err(PatchError::InvalidPriority {
                level: 4,
                amount: 4
            })
        );
        assert_eq!(reg.get(id).map(|r| r.priority()), Some(Priority::LOW));
        assert_eq!(
            reg.lagging(1, Quiescence::Local),
            vec![(Priority::LOW, 1)]
        );
    }

    #[test]
    fn scan_is_ordered_by_priority() {
        let reg = registry(Config::default());
        let levels = [Priority::LOW, Priority::CRITICAL, Priority::MEDIUM];
        let handles: Vec<_> = levels
            .into_iter()
            .map(|p| {
                let reg = Arc::clone(&reg);
                let (tx, rx) = std::sync::mpsc::channel::<()>();
                let h = std::thread::spawn(move || {
                    let id = reg.register("w").expect("registered");
                    reg.set_priority(id, p).expect("priority");
                    let _ = rx.recv();
                });
                (h, tx)
            })
            .collect();
        while reg.len() < 3
            || reg.snapshot().iter().filter(|r| r.priority() != Priority::LOW).count() < 2
        {
            std::thread::yield_now();
        }
        assert_eq!(
            reg.lagging(1, Quiescence::Local),
            vec![
                (Priority::CRITICAL, 1),
                (Priority::MEDIUM, 1),
                (Priority::LOW, 1)
            ]
        );
        for (h, tx) in handles {
            drop(tx);
            h.join().expect("join");
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn marks_are_idempotent_and_deactivation_exempts() {
        let reg = registry(Config::default());
        let id = reg.register("main").expect("registered");

        reg.mark_local_quiescent(id).expect("mark");
        reg.mark_local_quiescent(id).expect("mark");
        assert!(reg.lagging(1, Quiescence::Local).is_empty());
        assert_eq!(
            reg.lagging(1, Quiescence::Global),
            vec![(Priority::LOW, 1)]
        );

        reg.deactivate(id).expect("deactivate");
        assert!(reg.lagging(1, Quiescence::Global).is_empty());
        let rec = reg.get(id).expect("record");
        assert!(!rec.is_global_quiescent(1));

        reg.activate(id).expect("activate");
        reg.mark_global_quiescent(id).expect("mark");
        assert!(reg.lagging(1, Quiescence::Global).is_empty());
        assert_eq!(
            reg.lagging(2, Quiescence::Local),
            vec![(Priority::LOW, 1)]
        );
    }

    #[test]
    fn concurrent_births_get_unique_ids() {
        let reg = registry(Config::default());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    for _ in 0..8 {
                        let id = reg.register(&format!("t{i}")).expect("registered");
                        seen.push(id);
                        reg.unregister(id).expect("unregistered");
                    }
                    seen
                })
            })
            .collect();
        let ids: Vec<ThreadId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("join"))
            .collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(reg.is_empty());
    }
}
