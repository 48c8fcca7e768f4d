//! Line assembly and response classification
//!
//! Serial reads arrive in arbitrary chunks. [`LineAssembler`] accumulates
//! them and hands out complete lines, keeping any trailing fragment for the
//! next read. [`classify`] sorts a complete line into the categories the
//! flow controller reacts to.

use super::dialect::DialectPatterns;
use regex::Regex;
use std::sync::OnceLock;

fn line_break() -> &'static Regex {
    static LINE_BREAK: OnceLock<Regex> = OnceLock::new();
    LINE_BREAK.get_or_init(|| Regex::new(r"\r?\n").expect("invalid regex pattern"))
}

/// Accumulates incoming text into complete lines
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` and return every line it completes
    ///
    /// Empty lines are dropped, so a terminator split across two reads
    /// yields the same lines as the unsplit stream.
    pub fn push(&mut self, data: &str) -> Vec<String> {
        self.pending.push_str(data);

        let (lines, rest) = {
            let fragments: Vec<&str> = line_break().split(&self.pending).collect();
            match fragments.split_last() {
                Some((last, complete)) if !complete.is_empty() => (
                    complete
                        .iter()
                        .filter(|line| !line.is_empty())
                        .map(|line| line.to_string())
                        .collect::<Vec<_>>(),
                    last.to_string(),
                ),
                _ => {
                    tracing::trace!("No line terminator yet, holding {:?}", self.pending);
                    return Vec::new();
                }
            }
        };

        self.pending = rest;
        lines
    }

    /// Text received but not yet terminated
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

/// Category of a complete response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Acknowledges the oldest queued command
    Completion,
    /// Rejects the oldest queued command
    Error,
    /// Firmware (re)boot banner
    Banner,
    /// Reply to a status query
    StatusReport,
    /// Anything else
    Other,
}

/// Classify a complete line against a dialect's patterns
///
/// Completion and error take precedence over the banner, which takes
/// precedence over status reports.
pub fn classify(line: &str, patterns: &DialectPatterns) -> ResponseClass {
    if patterns.completion.is_match(line) {
        ResponseClass::Completion
    } else if patterns.error.is_match(line) {
        ResponseClass::Error
    } else if patterns.banner.is_match(line) {
        ResponseClass::Banner
    } else if patterns.status_report.is_match(line) {
        ResponseClass::StatusReport
    } else {
        ResponseClass::Other
    }
}
