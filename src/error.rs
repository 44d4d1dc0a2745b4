use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Broad family of a rejected command, reported to the issuing client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    /// The command payload itself was unacceptable.
    Validation,
    /// The command was well formed but not allowed in the current session state.
    Protocol,
}

/// Rejection of a single client command. Never broadcast, only sent to the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Poll creation input violates the poll constraints.
    #[error("invalid poll: {0}")]
    InvalidPoll(String),
    /// Selected option does not exist on the active poll.
    #[error("option index {index} is out of range")]
    InvalidOption {
        /// Index sent by the client.
        index: i64,
    },
    /// Display name is empty or too long.
    #[error("invalid display name: {0}")]
    InvalidName(String),
    /// Frame could not be decoded into a known command.
    #[error("malformed command: {0}")]
    Malformed(String),
    /// No poll is accepting responses.
    #[error("no poll is currently accepting responses")]
    NoActivePoll,
    /// The connection has not joined the session under a display name.
    #[error("join the session before answering")]
    NotRegistered,
    /// The participant already answered the active poll.
    #[error("`{0}` already answered this poll")]
    DuplicateResponse(String),
    /// The display name was removed from the session and cannot rejoin.
    #[error("`{0}` has been removed from this session")]
    Banned(String),
    /// Another connection already uses this display name.
    #[error("display name `{0}` is already taken")]
    NameTaken(String),
    /// The lifecycle state machine refused the transition.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl CommandError {
    /// Machine-readable reason code sent in `commandRejected` payloads.
    pub fn reason(&self) -> &'static str {
        match self {
            CommandError::InvalidPoll(_) => "invalidPoll",
            CommandError::InvalidOption { .. } => "invalidOption",
            CommandError::InvalidName(_) => "invalidName",
            CommandError::Malformed(_) => "malformedCommand",
            CommandError::NoActivePoll => "noActivePoll",
            CommandError::NotRegistered => "notRegistered",
            CommandError::DuplicateResponse(_) => "duplicateResponse",
            CommandError::Banned(_) => "banned",
            CommandError::NameTaken(_) => "nameTaken",
            CommandError::InvalidTransition(_) => "invalidTransition",
        }
    }

    /// Whether the issuer sent bad input or issued the command at the wrong time.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CommandError::InvalidPoll(_)
            | CommandError::InvalidOption { .. }
            | CommandError::InvalidName(_)
            | CommandError::Malformed(_) => ErrorCategory::Validation,
            CommandError::NoActivePoll
            | CommandError::NotRegistered
            | CommandError::DuplicateResponse(_)
            | CommandError::Banned(_)
            | CommandError::NameTaken(_)
            | CommandError::InvalidTransition(_) => ErrorCategory::Protocol,
        }
    }
}

impl From<ValidationErrors> for CommandError {
    fn from(err: ValidationErrors) -> Self {
        CommandError::InvalidPoll(format!("validation failed: {}", err))
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A session command was rejected.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Command(command) => match command.category() {
                ErrorCategory::Validation => AppError::BadRequest(command.to_string()),
                ErrorCategory::Protocol => AppError::Conflict(command.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
