use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{HistoryEntryEntity, PollEntity, ResponseEntity};

use super::error::MongoDaoError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoResponseDocument {
    participant: String,
    option_index: u32,
    submitted_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollDocument {
    #[serde(rename = "_id")]
    id: String,
    question: String,
    options: Vec<String>,
    correct_option: u32,
    started_at: DateTime,
    ends_at: DateTime,
    active: bool,
    #[serde(default)]
    responses: Vec<MongoResponseDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHistoryDocument {
    #[serde(rename = "_id")]
    id: String,
    question: String,
    options: Vec<String>,
    correct_option: u32,
    started_at: DateTime,
    ended_at: DateTime,
    end_reason: String,
    #[serde(default)]
    responses: Vec<MongoResponseDocument>,
    total_responses: u32,
}

impl From<ResponseEntity> for MongoResponseDocument {
    fn from(value: ResponseEntity) -> Self {
        Self {
            participant: value.participant,
            option_index: value.option_index,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<MongoResponseDocument> for ResponseEntity {
    fn from(value: MongoResponseDocument) -> Self {
        Self {
            participant: value.participant,
            option_index: value.option_index,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

impl From<PollEntity> for MongoPollDocument {
    fn from(value: PollEntity) -> Self {
        Self {
            id: value.id.to_string(),
            question: value.question,
            options: value.options,
            correct_option: value.correct_option,
            started_at: DateTime::from_system_time(value.started_at),
            ends_at: DateTime::from_system_time(value.ends_at),
            active: value.active,
            responses: value.responses.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<HistoryEntryEntity> for MongoHistoryDocument {
    fn from(value: HistoryEntryEntity) -> Self {
        Self {
            id: value.id.to_string(),
            question: value.question,
            options: value.options,
            correct_option: value.correct_option,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: DateTime::from_system_time(value.ended_at),
            end_reason: value.end_reason,
            responses: value.responses.into_iter().map(Into::into).collect(),
            total_responses: value.total_responses,
        }
    }
}

impl TryFrom<MongoHistoryDocument> for HistoryEntryEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoHistoryDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id)
            .map_err(|_| MongoDaoError::InvalidDocumentId { id: value.id.clone() })?;
        Ok(Self {
            id,
            question: value.question,
            options: value.options,
            correct_option: value.correct_option,
            started_at: value.started_at.to_system_time(),
            ended_at: value.ended_at.to_system_time(),
            end_reason: value.end_reason,
            responses: value.responses.into_iter().map(Into::into).collect(),
            total_responses: value.total_responses,
        })
    }
}

/// Filter document matching a record by its poll identifier.
pub fn doc_id(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

/// Encode a response list for a `$set` update.
pub fn responses_as_bson(responses: Vec<ResponseEntity>) -> Bson {
    Bson::Array(
        responses
            .into_iter()
            .map(|response| {
                Bson::Document(doc! {
                    "participant": response.participant,
                    "option_index": i64::from(response.option_index),
                    "submitted_at": DateTime::from_system_time(response.submitted_at),
                })
            })
            .collect(),
    )
}
