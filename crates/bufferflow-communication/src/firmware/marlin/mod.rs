//! Marlin firmware
//!
//! Same reprap-style line protocol as Repetier with a different boot
//! banner, `Error:` rejections and bare `X:... Y:...` position reports.

use crate::firmware::bufferflow::{Dialect, DialectPatterns, PatternSources};
use std::sync::OnceLock;
use std::time::Duration;

/// Receive buffer size in bytes
pub const MARLIN_BUFFER_SIZE: usize = 127;

/// Interval between `M114` status queries
pub const MARLIN_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const PATTERNS: PatternSources = PatternSources {
    completion: r"^ok\b",
    error: r"^Error:",
    banner: r"^start$|Marlin",
    status_report: r"^X:-?\d",
    skip: "^[!~\x18]$",
    pause: "^!$",
    unpause: "^~$",
    wipe: "^\x18$",
    no_response: None,
};

/// Marlin dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct Marlin;

impl Dialect for Marlin {
    fn name(&self) -> &'static str {
        "Marlin"
    }

    fn capacity(&self) -> usize {
        MARLIN_BUFFER_SIZE
    }

    fn status_query(&self) -> &'static str {
        "M114"
    }

    fn status_poll_interval(&self) -> Duration {
        MARLIN_POLL_INTERVAL
    }

    fn patterns(&self) -> &DialectPatterns {
        static COMPILED: OnceLock<DialectPatterns> = OnceLock::new();
        COMPILED.get_or_init(|| {
            DialectPatterns::compile("Marlin", &PATTERNS).expect("invalid Marlin patterns")
        })
    }
}
