//! # Trigger subsystem.
//!
//! Wakes the coordinator and paces its scans.
//!
//! ```text
//! signal_patching() ──┐
//! trigger_patch()   ──┼──► Notify (permit) ──► coordinator wakes, looks for a request
//! OS patch signal   ──┘    (SignalListener)
//!
//! AwaitingLocal / AwaitingGlobal / Migrating: scan ─► sleep(poll interval) ─► scan ...
//! ```
//!
//! Delivery is at-least-once: a notification sent while the coordinator is
//! busy is kept as a permit. The coordinator takes it right after the cycle
//! and arms whatever is staged; with nothing staged the wake is dropped
//! quietly, since it usually duplicated the one that started the cycle.

use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;

use crate::core::Config;

pub(crate) struct Trigger {
    notify: Notify,
    poll: Duration,
}

impl Trigger {
    pub(crate) fn new(cfg: &Config) -> Self {
        Self {
            notify: Notify::new(),
            poll: cfg.trigger_sleep_clamped(),
        }
    }

    /// Asks the coordinator to look for a pending request. Never blocks.
    pub(crate) fn kick(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await
    }

    /// Consumes a stored wake-up without waiting. Returns whether one was stored.
    pub(crate) fn take_pending(&self) -> bool {
        self.notify.notified().now_or_never().is_some()
    }

    /// Sleeps one poll interval.
    pub(crate) async fn tick(&self) {
        tokio::time::sleep(self.poll).await
    }
}

/// Optional OS signal that acts as a trigger (unix only).
///
/// Must be installed from inside the coordinator runtime.
pub(crate) struct SignalListener {
    #[cfg(unix)]
    inner: Option<tokio::signal::unix::Signal>,
}

impl SignalListener {
    #[cfg(unix)]
    pub(crate) fn install(signal: Option<i32>) -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal as listen};

        let inner = match signal {
            Some(raw) => Some(listen(SignalKind::from_raw(raw))?),
            None => None,
        };
        Ok(Self { inner })
    }

    #[cfg(not(unix))]
    pub(crate) fn install(signal: Option<i32>) -> std::io::Result<Self> {
        if let Some(raw) = signal {
            crate::wf_log!("patch signal {raw} ignored: not supported on this platform");
        }
        Ok(Self {})
    }

    /// Resolves on every delivery of the signal; pending forever if none is installed.
    #[cfg(unix)]
    pub(crate) async fn recv(&mut self) {
        match self.inner.as_mut() {
            Some(sig) => {
                if sig.recv().await.is_none() {
                    self.inner = None;
                    std::future::pending::<()>().await
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    #[cfg(not(unix))]
    pub(crate) async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_wake_is_taken_once() {
        let trigger = Trigger::new(&Config::default());
        assert!(!trigger.take_pending());

        // Repeated kicks collapse into one permit.
        trigger.kick();
        trigger.kick();
        assert!(trigger.take_pending());
        assert!(!trigger.take_pending());
    }
}
