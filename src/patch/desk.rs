//! # Patch desk: staging area and in-flight guard.
//!
//! ```text
//! set_patch / set_patch_method ──► staged
//!                                    │ arm()
//!                                    ▼
//!                             armed (version N) ──take_armed()──► coordinator
//!                                    │
//!                           in_flight = N until finish(N)
//! ```
//!
//! Arming consumes the staged payload; the staged method is sticky.
//! Only one request may be in flight; arming a second one fails with
//! `AlreadyArmed` until the coordinator calls `finish`.

use parking_lot::Mutex;

use crate::error::PatchError;
use crate::patch::{PatchMethod, PatchPayload, PatchRequest};

#[derive(Debug)]
struct DeskState {
    payload: Option<PatchPayload>,
    method: PatchMethod,
    next_version: u64,
    armed: Option<PatchRequest>,
    in_flight: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct PatchDesk {
    state: Mutex<DeskState>,
}

impl PatchDesk {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DeskState {
                payload: None,
                method: PatchMethod::default(),
                next_version: 1,
                armed: None,
                in_flight: None,
            }),
        }
    }

    pub(crate) fn stage_payload(&self, payload: PatchPayload) {
        self.state.lock().payload = Some(payload);
    }

    pub(crate) fn stage_method(&self, method: PatchMethod) {
        self.state.lock().method = method;
    }

    /// Turns the staged payload into an armed request.
    pub(crate) fn arm(&self) -> Result<PatchRequest, PatchError> {
        let mut st = self.state.lock();
        if let Some(version) = st.in_flight {
            return Err(PatchError::AlreadyArmed { version });
        }
        let payload = st.payload.take().ok_or(PatchError::NoPatchArmed)?;
        let version = st.next_version;
        st.next_version += 1;
        st.in_flight = Some(version);

        let req = PatchRequest::new(version, st.method, payload);
        st.armed = Some(req.clone());
        Ok(req)
    }

    /// Hands the armed request to the coordinator.
    pub(crate) fn take_armed(&self) -> Option<PatchRequest> {
        self.state.lock().armed.take()
    }

    /// Clears the in-flight guard for `version`.
    pub(crate) fn finish(&self, version: u64) {
        let mut st = self.state.lock();
        if st.in_flight == Some(version) {
            st.in_flight = None;
        }
    }

    pub(crate) fn in_flight(&self) -> Option<u64> {
        self.state.lock().in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_without_payload_fails() {
        let desk = PatchDesk::new();
        assert_eq!(desk.arm(), Err(PatchError::NoPatchArmed));
        assert!(desk.in_flight().is_none());
        assert!(desk.take_armed().is_none());
    }

    #[test]
    fn arm_consumes_payload_and_keeps_method() {
        let desk = PatchDesk::new();
        desk.stage_method(PatchMethod(3));
        desk.stage_payload("libfoo.so".into());

        let req = desk.arm().expect("armed");
        assert_eq!(req.version(), 1);
        assert_eq!(req.method(), PatchMethod(3));
        assert_eq!(req.payload().as_str(), "libfoo.so");
        assert_eq!(desk.take_armed(), Some(req));

        desk.finish(1);
        assert_eq!(desk.arm(), Err(PatchError::NoPatchArmed));

        desk.stage_payload("libfoo.so.2".into());
        let next = desk.arm().expect("armed again");
        assert_eq!(next.version(), 2);
        assert_eq!(next.method(), PatchMethod(3));
    }

    #[test]
    fn second_arm_rejected_while_in_flight() {
        let desk = PatchDesk::new();
        desk.stage_payload("a".into());
        desk.arm().expect("armed");
        desk.stage_payload("b".into());
        assert_eq!(desk.arm(), Err(PatchError::AlreadyArmed { version: 1 }));

        desk.finish(7);
        assert_eq!(desk.in_flight(), Some(1));
        desk.finish(1);
        assert_eq!(desk.arm().map(|r| r.version()), Ok(2));
    }
}
