use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{HistoryEntryEntity, ResponseEntity},
    dto::format_system_time,
};

/// Query string of `GET /api/polls/history`.
#[skip_serializing_none]
#[derive(Debug, Default, Deserialize, Serialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// 1-based page number, defaults to 1.
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<u64>,
    /// Entries per page, defaults to the configured page size.
    #[validate(range(min = 1, message = "limit must be at least 1"))]
    pub limit: Option<u64>,
}

/// Archived answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub participant: String,
    pub option_index: u32,
    pub submitted_at: String,
}

impl From<ResponseEntity> for HistoryResponse {
    fn from(response: ResponseEntity) -> Self {
        Self {
            participant: response.participant,
            option_index: response.option_index,
            submitted_at: format_system_time(response.submitted_at),
        }
    }
}

/// Archived poll.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub poll_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: u32,
    pub started_at: String,
    pub ended_at: String,
    pub end_reason: String,
    pub responses: Vec<HistoryResponse>,
    pub total_responses: u32,
}

impl From<HistoryEntryEntity> for HistoryEntry {
    fn from(entry: HistoryEntryEntity) -> Self {
        Self {
            poll_id: entry.id,
            question: entry.question,
            options: entry.options,
            correct_option: entry.correct_option,
            started_at: format_system_time(entry.started_at),
            ended_at: format_system_time(entry.ended_at),
            end_reason: entry.end_reason,
            responses: entry.responses.into_iter().map(Into::into).collect(),
            total_responses: entry.total_responses,
        }
    }
}

/// One page of history, newest poll first. Also the `historyChanged` payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPageResponse {
    pub entries: Vec<HistoryEntry>,
    pub total_count: u64,
    pub page: u64,
    pub page_count: u64,
}
