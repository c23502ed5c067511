//! Error types used by the patching runtime.
//!
//! This module defines three error enums:
//!
//! - [`PatchError`] — errors returned synchronously to callers of the thread and patch API.
//! - [`RuntimeError`] — errors raised while bringing the runtime up.
//! - [`ApplyError`] — errors reported by a [`PatchEngine`](crate::PatchEngine).
//!
//! All of them provide `as_label` (stable snake_case, for logs/metrics) and `as_message`.

use thiserror::Error;

use crate::core::ThreadId;

/// # Errors returned by registry and patch-control operations.
///
/// Structural registry errors are returned to the caller of the offending
/// operation. Coordinator-internal failures (`ApplyFailed`) never reach a
/// caller directly; they surface through events and [`CycleReport`](crate::CycleReport)s.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The registry already holds the configured maximum number of threads.
    #[error("thread registry full (max {max})")]
    CapacityExceeded {
        /// Configured `max_threads`.
        max: usize,
    },

    /// Operation on an id that is not registered, or not owned by the caller.
    #[error("unknown thread {id}")]
    UnknownThread {
        /// The offending id.
        id: ThreadId,
    },

    /// The calling thread is not registered with this patcher.
    #[error("calling thread is not registered")]
    NotRegistered,

    /// The calling thread is already registered with this patcher.
    #[error("thread already registered as {id}")]
    AlreadyRegistered {
        /// Id the calling thread is registered under.
        id: ThreadId,
    },

    /// Priority level is not below `amount_priorities`.
    #[error("invalid priority {level} (levels: {amount})")]
    InvalidPriority {
        /// Requested level.
        level: u8,
        /// Configured number of levels.
        amount: u8,
    },

    /// A trigger arrived while no patch payload was staged.
    #[error("no patch armed")]
    NoPatchArmed,

    /// A patch cycle is already in flight.
    #[error("patch {version} already in flight")]
    AlreadyArmed {
        /// Version of the in-flight request.
        version: u64,
    },

    /// The patch engine rejected the request.
    #[error("patch {version} failed to apply: {reason}")]
    ApplyFailed {
        /// Version of the failed request.
        version: u64,
        /// Engine-provided reason.
        reason: String,
    },
}

impl PatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use wfpatch::PatchError;
    ///
    /// assert_eq!(PatchError::NoPatchArmed.as_label(), "no_patch_armed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PatchError::CapacityExceeded { .. } => "capacity_exceeded",
            PatchError::UnknownThread { .. } => "unknown_thread",
            PatchError::NotRegistered => "not_registered",
            PatchError::AlreadyRegistered { .. } => "already_registered",
            PatchError::InvalidPriority { .. } => "invalid_priority",
            PatchError::NoPatchArmed => "no_patch_armed",
            PatchError::AlreadyArmed { .. } => "already_armed",
            PatchError::ApplyFailed { .. } => "apply_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PatchError::CapacityExceeded { max } => format!("registry full: max={max}"),
            PatchError::UnknownThread { id } => format!("unknown thread: id={id}"),
            PatchError::NotRegistered => "calling thread not registered".to_string(),
            PatchError::AlreadyRegistered { id } => format!("already registered: id={id}"),
            PatchError::InvalidPriority { level, amount } => {
                format!("invalid priority: level={level} amount={amount}")
            }
            PatchError::NoPatchArmed => "no patch staged".to_string(),
            PatchError::AlreadyArmed { version } => format!("in flight: version={version}"),
            PatchError::ApplyFailed { version, reason } => {
                format!("apply failed: version={version} reason={reason}")
            }
        }
    }
}

/// # Errors produced while starting the runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration cannot be used.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: &'static str,
    },

    /// The coordinator thread or its runtime could not be started.
    #[error("failed to start coordinator: {0}")]
    Spawn(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::Spawn(_) => "runtime_spawn_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::InvalidConfig { reason } => format!("invalid config: {reason}"),
            RuntimeError::Spawn(e) => format!("spawn failed: {e}"),
        }
    }
}

/// # Failure reported by a patch engine.
///
/// The engine guarantees the process is left fully on the old code when it
/// returns this error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ApplyError {
    reason: String,
}

impl ApplyError {
    /// Creates an error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The engine-provided reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "apply_error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            PatchError::CapacityExceeded { max: 2 }.as_label(),
            "capacity_exceeded"
        );
        assert_eq!(
            PatchError::UnknownThread { id: ThreadId::new(7) }.as_label(),
            "unknown_thread"
        );
        assert_eq!(
            PatchError::AlreadyArmed { version: 3 }.as_label(),
            "already_armed"
        );
        assert_eq!(
            RuntimeError::InvalidConfig { reason: "x" }.as_label(),
            "runtime_invalid_config"
        );
    }

    #[test]
    fn messages_carry_details() {
        let err = PatchError::InvalidPriority { level: 4, amount: 4 };
        assert_eq!(err.as_message(), "invalid priority: level=4 amount=4");
        assert_eq!(err.to_string(), "invalid priority 4 (levels: 4)");

        let err = PatchError::ApplyFailed {
            version: 2,
            reason: "bad symbol".into(),
        };
        assert!(err.as_message().contains("bad symbol"));
    }

    #[test]
    fn apply_error_displays_reason() {
        let err = ApplyError::new("relocation failed");
        assert_eq!(err.to_string(), "relocation failed");
        assert_eq!(err.reason(), "relocation failed");
    }
}
