//! # Process diagnostics: timestamps and log lines.
//!
//! [`wf_time`] returns wall-clock seconds since the Unix epoch as `f64`.
//! [`wf_log!`](crate::wf_log) writes one line to stderr, prefixed with that
//! timestamp and the calling thread's name:
//!
//! ```text
//! [1692389869.508875] [wfpatch] [wf-coordinator] patch 3 applied
//! ```

use std::fmt;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-second precision.
pub fn wf_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[doc(hidden)]
pub fn write_line(args: fmt::Arguments<'_>) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("unnamed");
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "[{:.6}] [wfpatch] [{}] {}", wf_time(), name, args);
}

/// Writes a timestamped diagnostic line to stderr.
///
/// ```
/// wfpatch::wf_log!("patch {} staged", 3);
/// ```
#[macro_export]
macro_rules! wf_log {
    ($($arg:tt)*) => {
        $crate::diagnostics::write_line(format_args!($($arg)*))
    };
}
