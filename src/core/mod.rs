//! Runtime core: thread registry, coordinator and lifecycle.
//!
//! The public entry point is [`Patcher`], built through [`PatcherBuilder`].
//!
//! Internal modules:
//! - [`registry`]: thread records, priority buckets, calling-thread bindings;
//! - [`coordinator`]: the patch-cycle state machine on the `wf-coordinator` thread;
//! - [`migration`]: per-cycle migration tickets and the remaining counter;
//! - [`trigger`]: wake-ups, poll pacing and the optional patch signal;
//! - [`state`]: phase, epoch, active version and the last cycle report.

mod builder;
mod config;
mod coordinator;
mod migration;
mod patcher;
pub(crate) mod phase;
mod record;
mod registry;
mod state;
mod trigger;

pub use builder::PatcherBuilder;
pub use config::Config;
pub use patcher::Patcher;
pub use phase::Phase;
pub use record::{Priority, ThreadId, ThreadRecord};
pub use registry::ThreadRegistry;
pub use state::{CycleOutcome, CycleReport};
