//! Submission preprocessing
//!
//! Breaks a raw multi-line submission into atomic commands, strips
//! comments and whitespace, and picks out the synthetic directives that
//! are handled locally instead of being sent to the device.

use regex::Regex;
use std::sync::OnceLock;

/// Synthetic tokens recognised in a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveTokens<'a> {
    /// Replays the last firmware banner
    pub init: &'a str,
    /// Replays the last status report
    pub status: &'a str,
    /// Wipes the local buffer
    pub wipe: &'a str,
    /// The device's own status query command
    pub status_query: &'a str,
}

/// One cleaned item of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionItem {
    /// Command to queue and send, terminator included
    Command(String),
    /// The device status query, queued like any other command
    StatusQuery(String),
    /// Replay the last firmware banner
    Init,
    /// Replay the last status report
    Status,
    /// Wipe the local buffer
    Wipe,
}

/// Remove `( ... )` and `; ...` comments and all whitespace
pub fn strip_comments(item: &str) -> String {
    static PAREN_COMMENT: OnceLock<Regex> = OnceLock::new();
    static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();

    let paren =
        PAREN_COMMENT.get_or_init(|| Regex::new(r"\(.*?\)").expect("invalid regex pattern"));
    let line = LINE_COMMENT.get_or_init(|| Regex::new(r";.*").expect("invalid regex pattern"));

    let without_paren = paren.replace_all(item, "");
    let without_line = line.replace_all(&without_paren, "");
    without_line.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split a submission into items, in their original order
///
/// Items that are empty after stripping are dropped silently.
pub fn split_submission(submission: &str, tokens: &DirectiveTokens<'_>) -> Vec<SubmissionItem> {
    submission
        .split('\n')
        .filter_map(|raw| {
            let item = strip_comments(raw);
            if item.is_empty() {
                None
            } else if item == tokens.init {
                Some(SubmissionItem::Init)
            } else if item == tokens.status {
                Some(SubmissionItem::Status)
            } else if item == tokens.status_query {
                Some(SubmissionItem::StatusQuery(format!("{}\n", item)))
            } else if item == tokens.wipe {
                Some(SubmissionItem::Wipe)
            } else {
                Some(SubmissionItem::Command(format!("{}\n", item)))
            }
        })
        .collect()
}
