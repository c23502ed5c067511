//! Patch requests, staging, and the engine contract.
//!
//! - [`PatchRequest`], [`PatchMethod`], [`PatchPayload`]: what gets applied
//! - [`PatchEngine`]: how it gets applied (external)
//! - `PatchDesk`: staging and the one-request-in-flight guard

mod desk;
mod engine;
mod request;

pub(crate) use desk::PatchDesk;
pub use engine::{NoopEngine, PatchEngine};
pub use request::{PatchMethod, PatchPayload, PatchRequest};
