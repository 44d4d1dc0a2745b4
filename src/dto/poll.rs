//! Poll payloads shared by WebSocket events, the SSE mirror and the REST API.

use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::poll::{EndReason, EndedPoll, Poll, Response},
};

/// One accepted answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub participant: String,
    pub option_index: u32,
    /// RFC 3339 submission time.
    pub submitted_at: String,
}

impl From<&Response> for ResponseSummary {
    fn from(response: &Response) -> Self {
        Self {
            participant: response.participant.clone(),
            option_index: response.option_index as u32,
            submitted_at: format_system_time(response.submitted_at),
        }
    }
}

/// Full view of the active poll, sent with `pollStarted`, `pollUpdated` and `currentState`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub poll_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: u32,
    pub started_at: String,
    pub ends_at: String,
    /// Milliseconds until the deadline. Zero or negative means the poll is effectively over.
    pub remaining_ms: i64,
    pub responses: Vec<ResponseSummary>,
    pub total_responses: u32,
    /// Number of responses per option, in option order.
    pub tallies: Vec<u32>,
}

impl PollSnapshot {
    /// Capture `poll` as seen at `now`.
    pub fn capture(poll: &Poll, now: Instant) -> Self {
        Self {
            poll_id: poll.id(),
            question: poll.question().to_owned(),
            options: poll.options().to_vec(),
            correct_option: poll.correct_option() as u32,
            started_at: format_system_time(poll.started_at()),
            ends_at: format_system_time(poll.ends_at()),
            remaining_ms: poll.remaining_ms(now),
            responses: poll.responses().map(ResponseSummary::from).collect(),
            total_responses: poll.total_responses() as u32,
            tallies: poll.tallies(),
        }
    }
}

/// Broadcast once when a poll stops accepting responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollEndedEvent {
    pub reason: EndReason,
    pub poll_id: Uuid,
    pub total_responses: u32,
}

impl From<&EndedPoll> for PollEndedEvent {
    fn from(ended: &EndedPoll) -> Self {
        Self {
            reason: ended.reason,
            poll_id: ended.poll.id(),
            total_responses: ended.poll.total_responses() as u32,
        }
    }
}
