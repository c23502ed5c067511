//! # Patch application engine contract.
//!
//! The runtime decides *when* a patch may be applied; a [`PatchEngine`]
//! decides *how*. The coordinator calls [`PatchEngine::apply`] exactly once
//! per armed request, never concurrently with itself, on a blocking worker
//! thread, after every active thread reported local and global quiescence.
//!
//! The engine owns atomicity: on `Err` the process must still run the old
//! code in full; on `Ok` it must be ready for threads to migrate.

use crate::error::ApplyError;
use crate::patch::PatchRequest;

/// Performs the actual code switch-over.
pub trait PatchEngine: Send + Sync + 'static {
    fn apply(&self, request: &PatchRequest) -> Result<(), ApplyError>;
}

/// Engine that accepts every request without touching code.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEngine;

impl PatchEngine for NoopEngine {
    fn apply(&self, _request: &PatchRequest) -> Result<(), ApplyError> {
        Ok(())
    }
}

/// Any `Fn(&PatchRequest) -> Result<(), ApplyError>` is an engine.
impl<F> PatchEngine for F
where
    F: Fn(&PatchRequest) -> Result<(), ApplyError> + Send + Sync + 'static,
{
    fn apply(&self, request: &PatchRequest) -> Result<(), ApplyError> {
        self(request)
    }
}
