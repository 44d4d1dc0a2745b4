use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{CommandError, ErrorCategory},
    state::poll::PollDraft,
};

/// Longest poll accepted, in seconds (one day).
pub const MAX_POLL_DURATION_SECS: u64 = 86_400;

#[derive(Debug, Deserialize, ToSchema)]
/// Commands accepted from WebSocket clients, tagged by `type`.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundCommand {
    /// Start a poll, replacing the active one if any.
    CreatePoll(CreatePollCommand),
    /// Answer the active poll under the connection's display name.
    #[serde(rename_all = "camelCase")]
    SubmitResponse { option_index: i64 },
    /// End the active poll now.
    EndPoll,
    /// Register the connection under a display name.
    JoinSession { name: String },
    /// Remove a participant and ban its name.
    KickParticipant { name: String },
    /// Ask for the current poll snapshot.
    RequestCurrentState,
    #[serde(other)]
    Unknown,
}

impl InboundCommand {
    /// Decode a text frame, mapping any decoding problem to [`CommandError::Malformed`].
    pub fn from_json_str(text: &str) -> Result<Self, CommandError> {
        match serde_json::from_str::<Self>(text) {
            Ok(InboundCommand::Unknown) => {
                Err(CommandError::Malformed("unknown command type".into()))
            }
            Ok(command) => Ok(command),
            Err(err) => Err(CommandError::Malformed(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "crate::dto::validation::validate_correct_option"))]
/// Parameters of a new poll.
pub struct CreatePollCommand {
    #[validate(
        length(min = 1, message = "question must not be empty"),
        custom(function = "crate::dto::validation::validate_not_blank")
    )]
    pub question: String,
    #[validate(
        length(min = 2, max = 4, message = "a poll needs between 2 and 4 options"),
        custom(function = "crate::dto::validation::validate_options")
    )]
    pub options: Vec<String>,
    pub correct_option: i64,
    #[validate(range(
        min = 1,
        max = MAX_POLL_DURATION_SECS,
        message = "duration must be between 1 and 86400 seconds"
    ))]
    pub duration_seconds: u64,
}

impl TryFrom<CreatePollCommand> for PollDraft {
    type Error = CommandError;

    fn try_from(command: CreatePollCommand) -> Result<Self, Self::Error> {
        command.validate()?;
        let correct_option = usize::try_from(command.correct_option)
            .map_err(|_| CommandError::InvalidPoll("correct option out of range".into()))?;

        Ok(Self {
            question: command.question.trim().to_owned(),
            options: command
                .options
                .iter()
                .map(|option| option.trim().to_owned())
                .collect(),
            correct_option,
            duration: Duration::from_secs(command.duration_seconds),
        })
    }
}

#[derive(Debug, Serialize)]
/// Envelope of every outbound frame: `{"event": name, "data": payload}`.
pub struct OutboundFrame<'a, T: ?Sized> {
    pub event: &'a str,
    pub data: &'a T,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to everyone whenever the set of joined display names changes.
pub struct RosterChangedEvent {
    pub names: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a connection once it joined the session.
pub struct SessionJoinedEvent {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Sent to a participant whose response was recorded.
pub struct ResponseAcceptedEvent {
    pub poll_id: Uuid,
    pub option_index: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a connection that was kicked.
pub struct RemovedFromSessionEvent {}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to the issuer of a rejected command.
pub struct CommandRejectedEvent {
    pub reason: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&CommandError> for CommandRejectedEvent {
    fn from(err: &CommandError) -> Self {
        Self {
            reason: err.reason().to_owned(),
            category: err.category(),
            message: err.to_string(),
        }
    }
}
