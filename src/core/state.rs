//! # Coordinator state and cycle reports.
//!
//! [`CoordinatorState`] is written by the coordinator only; everybody else
//! reads it. It carries:
//! - the current [`Phase`],
//! - the quiescence `epoch` (bumping it expires every reported flag),
//! - the `active_version` threads migrate onto,
//! - the last finished [`CycleReport`].

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::{Phase, phase::PhaseCell};
use crate::patch::PatchRequest;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The engine applied the request and every thread migrated.
    Applied,
    /// The engine failed; the process keeps running the old code.
    Failed(String),
}

/// Summary of one finished patch cycle. Times are [`wf_time`](crate::wf_time) seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub request: PatchRequest,
    pub outcome: CycleOutcome,
    /// When the coordinator picked the request up.
    pub started_at: f64,
    /// When the engine returned successfully.
    pub applied_at: Option<f64>,
    /// When the cycle returned to idle.
    pub finished_at: f64,
}

impl CycleReport {
    /// Seconds between pickup and the engine returning, if it succeeded.
    pub fn quiescence_latency(&self) -> Option<f64> {
        self.applied_at.map(|t| t - self.started_at)
    }
}

#[derive(Debug)]
pub(crate) struct CoordinatorState {
    phase: PhaseCell,
    epoch: AtomicU64,
    active_version: AtomicU64,
    last_cycle: Mutex<Option<CycleReport>>,
}

impl CoordinatorState {
    pub(crate) fn new() -> Self {
        Self {
            phase: PhaseCell::new(),
            epoch: AtomicU64::new(1),
            active_version: AtomicU64::new(0),
            last_cycle: Mutex::new(None),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.set(phase);
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Expires every flag reported so far.
    pub(crate) fn next_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn active_version(&self) -> u64 {
        self.active_version.load(Ordering::Acquire)
    }

    pub(crate) fn publish_version(&self, version: u64) {
        self.active_version.store(version, Ordering::Release);
    }

    pub(crate) fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.lock().clone()
    }

    pub(crate) fn record_cycle(&self, report: CycleReport) {
        *self.last_cycle.lock() = Some(report);
    }
}
