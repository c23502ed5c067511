//! The configured OS signal arms the staged payload.
//!
//! Lives in its own test binary: the handler it installs is process-wide.
#![cfg(target_os = "linux")]

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use wfpatch::{Config, EventKind, Patcher, Phase};

const SIGUSR1: i32 = 10;

#[test]
fn patch_signal_arms_the_staged_payload() {
    let patcher = Patcher::builder(Config {
        trigger_sleep: Duration::from_millis(1),
        patch_signal: Some(SIGUSR1),
        ..Config::default()
    })
    .build()
    .expect("runtime");
    let mut events = patcher.events();

    patcher.set_patch("libsignal.so");
    let status = Command::new("kill")
        .args(["-USR1", &std::process::id().to_string()])
        .status()
        .expect("kill");
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline
        && !(patcher.active_version() == 1 && patcher.phase() == Phase::Idle)
    {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(patcher.active_version(), 1);
    assert_eq!(patcher.last_cycle().map(|c| c.request.version()), Some(1));

    let requested = std::iter::from_fn(|| events.try_recv().ok())
        .find(|ev| ev.kind == EventKind::PatchRequested)
        .expect("requested");
    assert_eq!(
        requested.payload.as_ref().map(|p| p.as_str()),
        Some("libsignal.so")
    );
}
