//! # Patch cycle phases.
//!
//! ```text
//! Idle ─► Armed ─► AwaitingLocal ─► AwaitingGlobal ─► Applying ─► Migrating ─► Idle
//!                                                         │
//!                                                         └─► (engine failed) ─► Idle
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// No request in flight.
    Idle = 0,
    /// A request was accepted; the next scan starts shortly.
    Armed = 1,
    /// Waiting for every active thread's local flag.
    AwaitingLocal = 2,
    /// Waiting for every active thread's local and global flag.
    AwaitingGlobal = 3,
    /// The engine is running.
    Applying = 4,
    /// Waiting for threads to move onto the new version.
    Migrating = 5,
}

impl Phase {
    /// Stable snake_case name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Armed => "armed",
            Phase::AwaitingLocal => "awaiting_local",
            Phase::AwaitingGlobal => "awaiting_global",
            Phase::Applying => "applying",
            Phase::Migrating => "migrating",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Armed,
            2 => Phase::AwaitingLocal,
            3 => Phase::AwaitingGlobal,
            4 => Phase::Applying,
            5 => Phase::Migrating,
            _ => Phase::Idle,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase cell written by the coordinator only, readable from anywhere.
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Phase::Idle as u8))
    }

    pub(crate) fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}
