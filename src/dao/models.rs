use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Single participant answer as persisted alongside polls and history entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEntity {
    /// Display name of the participant at submission time.
    pub participant: String,
    /// Index of the selected option.
    pub option_index: u32,
    /// Wall-clock time of the submission.
    pub submitted_at: SystemTime,
}

/// Poll record written when a poll starts and rewritten when it ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollEntity {
    /// Primary key of the poll.
    pub id: Uuid,
    /// Question text.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option: u32,
    /// When the poll started.
    pub started_at: SystemTime,
    /// Scheduled deadline while active, frozen end time once ended.
    pub ends_at: SystemTime,
    /// Whether the poll was still accepting responses when written.
    pub active: bool,
    /// Responses collected so far, in submission order.
    pub responses: Vec<ResponseEntity>,
}

/// Archived snapshot of an ended poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntryEntity {
    /// Identifier of the poll this entry archives (one entry per poll).
    pub id: Uuid,
    /// Question text.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option: u32,
    /// When the poll started.
    pub started_at: SystemTime,
    /// When the poll ended.
    pub ended_at: SystemTime,
    /// Why the poll ended (`manual`, `timeout` or `superseded`).
    pub end_reason: String,
    /// Full response sequence in submission order.
    pub responses: Vec<ResponseEntity>,
    /// Number of responses collected.
    pub total_responses: u32,
}

/// One page of history entries plus the overall entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPageEntity {
    /// Entries of the requested page, newest start time first.
    pub entries: Vec<HistoryEntryEntity>,
    /// Total number of archived entries.
    pub total: u64,
}
