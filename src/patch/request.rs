//! # Patch request model.
//!
//! A [`PatchRequest`] bundles what the engine needs: an opaque payload
//! (library path, handle name, ...), the engine method to use, and the
//! version the request was armed as.

use std::fmt;
use std::sync::Arc;

/// Engine method identifier. Opaque to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PatchMethod(pub u32);

impl fmt::Display for PatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method-{}", self.0)
    }
}

/// Opaque payload descriptor handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchPayload(Arc<str>);

impl PatchPayload {
    pub fn new(descriptor: impl Into<Arc<str>>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PatchPayload {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PatchPayload {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for PatchPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An armed patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    version: u64,
    method: PatchMethod,
    payload: PatchPayload,
}

impl PatchRequest {
    pub(crate) fn new(version: u64, method: PatchMethod, payload: PatchPayload) -> Self {
        Self {
            version,
            method,
            payload,
        }
    }

    /// Monotonic version, starting at 1.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn method(&self) -> PatchMethod {
        self.method
    }

    pub fn payload(&self) -> &PatchPayload {
        &self.payload
    }
}
