//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for observing the patching runtime.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** on the coordinator runtime
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! Subscribers observe; they cannot influence a cycle. Use [`Hooks`](crate::Hooks)
//! to kick threads or react synchronously to a patch.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use wfpatch::{Event, EventKind, Subscribe};
//!
//! struct Latency;
//!
//! #[async_trait]
//! impl Subscribe for Latency {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::PatchApplied) {
//!             // record apply latency, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "latency" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// ### Implementation requirements
/// - Avoid blocking the coordinator runtime; it also drives the state machine.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events are delivered in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber (min 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
