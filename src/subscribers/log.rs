//! # LogWriter — event printer
//!
//! A subscriber that renders incoming [`Event`]s through [`wf_log!`](crate::wf_log).
//!
//! ## Example output
//! ```text
//! [1692389869.508875] [wfpatch] [wf-coordinator] [thread-born] thread=#1 name="worker-0" priority=low
//! [1692389869.509120] [wfpatch] [wf-coordinator] [patch-requested] version=1 payload="libredis.so.2"
//! [1692389869.509300] [wfpatch] [wf-coordinator] [phase] version=1 phase=awaiting_local
//! [1692389869.531002] [wfpatch] [wf-coordinator] [patch-applied] version=1 to_migrate=4
//! [1692389869.531950] [wfpatch] [wf-coordinator] [migrated] thread=#1 name="worker-0" version=1 remaining=3
//! [1692389869.540011] [wfpatch] [wf-coordinator] [patch-done] version=1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::wf_log;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn thread(e: &Event) -> String {
    match (e.thread, e.name.as_deref()) {
        (Some(id), Some(name)) => format!("thread={id} name={name:?}"),
        (Some(id), None) => format!("thread={id}"),
        _ => "thread=?".to_string(),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        let version = e.version.unwrap_or(0);
        match e.kind {
            EventKind::ThreadBorn => {
                let p = e.priority.unwrap_or_default();
                wf_log!("[thread-born] {} priority={p}", thread(e));
            }
            EventKind::ThreadDied => wf_log!("[thread-died] {}", thread(e)),
            EventKind::PriorityChanged => {
                let p = e.priority.unwrap_or_default();
                wf_log!("[priority] {} priority={p}", thread(e));
            }
            EventKind::ThreadActivated => wf_log!("[activated] {}", thread(e)),
            EventKind::ThreadDeactivated => wf_log!("[deactivated] {}", thread(e)),
            EventKind::PatchRequested => {
                let payload = e.payload.as_ref().map_or("", |p| p.as_str());
                wf_log!("[patch-requested] version={version} payload={payload:?}");
            }
            EventKind::TriggerIgnored => wf_log!("[trigger-ignored] reason={reason:?}"),
            EventKind::PhaseChanged => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("?");
                wf_log!("[phase] version={version} phase={phase}");
            }
            EventKind::QuiescenceKicked => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("?");
                wf_log!(
                    "[kick] phase={phase} priority={} lagging={}",
                    e.priority.unwrap_or_default(),
                    e.remaining.unwrap_or(0)
                );
            }
            EventKind::KickRejected => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("?");
                wf_log!(
                    "[kick-rejected] phase={phase} priority={}",
                    e.priority.unwrap_or_default()
                );
            }
            EventKind::PatchApplied => wf_log!(
                "[patch-applied] version={version} to_migrate={}",
                e.remaining.unwrap_or(0)
            ),
            EventKind::PatchFailed => {
                wf_log!("[patch-failed] version={version} err={reason:?}");
            }
            EventKind::ThreadMigrated => wf_log!(
                "[migrated] {} version={version} remaining={}",
                thread(e),
                e.remaining.unwrap_or(0)
            ),
            EventKind::PatchDone => wf_log!("[patch-done] version={version}"),
            EventKind::SubscriberOverflow => wf_log!(
                "[subscriber-overflow] subscriber={:?} reason={reason:?}",
                e.name.as_deref().unwrap_or("unknown")
            ),
            EventKind::SubscriberPanicked => wf_log!(
                "[subscriber-panicked] subscriber={} info={reason}",
                e.name.as_deref().unwrap_or("unknown")
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
