//! Firmware dialect description
//!
//! Everything that differs between firmware flavours lives behind the
//! [`Dialect`] trait: buffer capacity, the status query and its interval,
//! the response patterns and the directive character classes. The queue,
//! gate and line handling are shared.

use bufferflow_core::FirmwareError;
use regex::Regex;
use std::time::Duration;

/// Pattern sources for a dialect, as written in the firmware modules
#[derive(Debug, Clone, Copy)]
pub struct PatternSources {
    /// Line that acknowledges the oldest queued command
    pub completion: &'static str,
    /// Line that rejects the oldest queued command
    pub error: &'static str,
    /// Line emitted when the firmware (re)boots
    pub banner: &'static str,
    /// Reply to the status query
    pub status_report: &'static str,
    /// Commands that bypass the buffer entirely
    pub skip: &'static str,
    /// Commands that force the buffer to pause
    pub pause: &'static str,
    /// Commands that force the buffer to resume
    pub unpause: &'static str,
    /// Commands that wipe the buffer
    pub wipe: &'static str,
    /// Commands the firmware never acknowledges, if any
    pub no_response: Option<&'static str>,
}

/// Compiled pattern set
#[derive(Debug, Clone)]
pub struct DialectPatterns {
    pub completion: Regex,
    pub error: Regex,
    pub banner: Regex,
    pub status_report: Regex,
    pub skip: Regex,
    pub pause: Regex,
    pub unpause: Regex,
    pub wipe: Regex,
    pub no_response: Option<Regex>,
}

impl DialectPatterns {
    /// Compile a dialect's pattern sources
    pub fn compile(firmware: &str, sources: &PatternSources) -> Result<Self, FirmwareError> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| FirmwareError::InvalidPattern {
                firmware: firmware.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            completion: build(sources.completion)?,
            error: build(sources.error)?,
            banner: build(sources.banner)?,
            status_report: build(sources.status_report)?,
            skip: build(sources.skip)?,
            pause: build(sources.pause)?,
            unpause: build(sources.unpause)?,
            wipe: build(sources.wipe)?,
            no_response: sources.no_response.map(build).transpose()?,
        })
    }
}

/// Firmware-specific tuning consumed by the shared flow controller
pub trait Dialect: Send + Sync + 'static {
    /// Display name of the firmware
    fn name(&self) -> &'static str;

    /// Bytes of unacknowledged command text the device can hold
    fn capacity(&self) -> usize;

    /// Command that asks the device for a status report, without terminator
    fn status_query(&self) -> &'static str;

    /// How often the status poller sends the status query
    fn status_poll_interval(&self) -> Duration;

    /// Compiled response and directive patterns
    fn patterns(&self) -> &DialectPatterns;

    /// Synthetic token that replays the last firmware banner
    fn init_token(&self) -> &'static str {
        "*init*"
    }

    /// Synthetic token that replays the last status report
    fn status_token(&self) -> &'static str {
        "*status*"
    }

    /// Token that wipes the local buffer without reaching the device
    fn wipe_token(&self) -> &'static str {
        "%"
    }

    /// Re-encode a command before it is written
    ///
    /// `None` means the command is sent as given.
    fn rewrite(&self, _command: &str, _id: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCES: PatternSources = PatternSources {
        completion: "^ok$",
        error: "^error",
        banner: "Boot",
        status_report: "^<.*>$",
        skip: "[!~]",
        pause: "!",
        unpause: "~",
        wipe: "\x18",
        no_response: None,
    };

    #[test]
    fn test_compile_patterns() {
        let patterns = DialectPatterns::compile("test", &SOURCES).expect("valid patterns");
        assert!(patterns.completion.is_match("ok"));
        assert!(!patterns.completion.is_match("ok C:1"));
        assert!(patterns.wipe.is_match("\u{18}"));
        assert!(patterns.no_response.is_none());
    }

    #[test]
    fn test_invalid_pattern_reports_firmware() {
        let broken = PatternSources {
            banner: "(",
            ..SOURCES
        };
        match DialectPatterns::compile("broken", &broken) {
            Err(FirmwareError::InvalidPattern { firmware, .. }) => assert_eq!(firmware, "broken"),
            other => panic!("expected invalid pattern, got {:?}", other.map(|_| ())),
        }
    }
}
