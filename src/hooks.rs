//! # Application hooks.
//!
//! [`Hooks`] is the capability set the embedding application hands to the
//! runtime. Every method has a no-op default, so an application implements
//! only what it needs; [`NoHooks`] implements none.
//!
//! | hook                        | caller / thread                      |
//! |-----------------------------|--------------------------------------|
//! | `trigger_local_quiescence`  | coordinator, every local scan         |
//! | `trigger_global_quiescence` | coordinator, every global scan        |
//! | `patch_applied`             | coordinator, once per successful apply |
//! | `thread_migrated`           | the migrating thread (or the thread leaving) |
//! | `patch_done`                | coordinator, once remaining reaches 0 |
//!
//! Hooks must not call back into [`Patcher::trigger_patch`](crate::Patcher::trigger_patch)
//! expecting it to succeed: the cycle they run in is still in flight.

use crate::core::Priority;
use crate::patch::PatchRequest;

/// Callbacks the coordinator invokes while driving a patch cycle.
pub trait Hooks: Send + Sync + 'static {
    /// Kicks threads of `priority` toward a global quiescence point.
    ///
    /// Return `false` if the kick could not be delivered; the coordinator
    /// logs it and keeps polling.
    fn trigger_global_quiescence(&self, _priority: Priority) -> bool {
        true
    }

    /// Kicks threads of `priority` toward a local quiescence point.
    fn trigger_local_quiescence(&self, _priority: Priority) -> bool {
        true
    }

    /// A thread moved onto the new version; `remaining` threads are left.
    fn thread_migrated(&self, _remaining: usize) {}

    /// The engine applied `request`. Migration starts right after.
    fn patch_applied(&self, _request: &PatchRequest) {}

    /// Every thread migrated onto `request`.
    fn patch_done(&self, _request: &PatchRequest) {}
}

/// Empty hook set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}
