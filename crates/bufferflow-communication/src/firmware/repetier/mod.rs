//! Repetier firmware
//!
//! Repetier holds 127 bytes of unacknowledged input, answers each line with
//! `ok` or `error...`, and replies to `M114` with `ok X:... Y:...`. It
//! prints a line containing `Repetier` on boot, which voids anything still
//! queued on the host side.

use crate::firmware::bufferflow::{Dialect, DialectPatterns, PatternSources};
use std::sync::OnceLock;
use std::time::Duration;

/// Receive buffer size in bytes
pub const REPETIER_BUFFER_SIZE: usize = 127;

/// Interval between `M114` status queries
pub const REPETIER_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const PATTERNS: PatternSources = PatternSources {
    completion: r"^ok$",
    error: r"^error",
    banner: r"Repetier",
    status_report: r"^(ok C:|ok X:)",
    skip: "^[!~\x18]$",
    pause: "^!$",
    unpause: "^~$",
    wipe: "^\x18$",
    no_response: None,
};

/// Repetier dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct Repetier;

impl Dialect for Repetier {
    fn name(&self) -> &'static str {
        "Repetier"
    }

    fn capacity(&self) -> usize {
        REPETIER_BUFFER_SIZE
    }

    fn status_query(&self) -> &'static str {
        "M114"
    }

    fn status_poll_interval(&self) -> Duration {
        REPETIER_POLL_INTERVAL
    }

    fn patterns(&self) -> &DialectPatterns {
        static COMPILED: OnceLock<DialectPatterns> = OnceLock::new();
        COMPILED.get_or_init(|| {
            DialectPatterns::compile("Repetier", &PATTERNS).expect("invalid Repetier patterns")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetier_directives() {
        let patterns = Repetier.patterns();
        assert!(patterns.skip.is_match("!"));
        assert!(patterns.skip.is_match("~"));
        assert!(patterns.skip.is_match("\u{18}"));
        assert!(!patterns.skip.is_match("G1X10"));
        assert!(!patterns.skip.is_match("M114\n"));
        assert!(!patterns.skip.is_match("M117 Done!"));
        assert!(!patterns.skip.is_match("!~"));
        assert!(patterns.pause.is_match("!"));
        assert!(!patterns.pause.is_match("~"));
        assert!(patterns.unpause.is_match("~"));
        assert!(patterns.wipe.is_match("\u{18}"));
        assert!(!patterns.wipe.is_match("G1\u{18}"));
        assert!(patterns.no_response.is_none());
    }

    #[test]
    fn test_repetier_tuning() {
        assert_eq!(Repetier.capacity(), 127);
        assert_eq!(Repetier.status_query(), "M114");
        assert_eq!(Repetier.status_poll_interval(), Duration::from_secs(2));
        assert_eq!(Repetier.wipe_token(), "%");
        assert_eq!(Repetier.rewrite("G1X1\n", "1"), None);
    }
}
