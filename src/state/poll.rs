use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{HistoryEntryEntity, PollEntity, ResponseEntity},
    error::CommandError,
};

/// Identifier assigned to a poll when it starts.
pub type PollId = Uuid;

/// Why a poll stopped accepting responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// The presenter ended the poll.
    Manual,
    /// The deadline elapsed.
    Timeout,
    /// A newer poll replaced it.
    Superseded,
}

impl EndReason {
    /// Stable lowercase label used in logs and persisted history.
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Manual => "manual",
            EndReason::Timeout => "timeout",
            EndReason::Superseded => "superseded",
        }
    }
}

/// Validated poll parameters, ready to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    /// Question text.
    pub question: String,
    /// Ordered options, trimmed and non-empty.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option: usize,
    /// Time during which responses are accepted.
    pub duration: Duration,
}

/// Single accepted answer. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Display name of the participant.
    pub participant: String,
    /// Selected option.
    pub option_index: usize,
    /// Wall-clock submission time, derived from the poll start and the monotonic clock.
    pub submitted_at: SystemTime,
}

impl From<&Response> for ResponseEntity {
    fn from(response: &Response) -> Self {
        Self {
            participant: response.participant.clone(),
            option_index: response.option_index as u32,
            submitted_at: response.submitted_at,
        }
    }
}

/// The live poll owned by the coordinator.
#[derive(Debug, Clone)]
pub struct Poll {
    id: PollId,
    question: String,
    options: Vec<String>,
    correct_option: usize,
    duration: Duration,
    started_at: SystemTime,
    started: Instant,
    deadline: Instant,
    // keyed by participant name, insertion order is submission order
    responses: IndexMap<String, Response>,
}

impl Poll {
    /// Start a poll at `now`, stamping `wall_now` as its start time.
    pub fn start(draft: PollDraft, now: Instant, wall_now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: draft.question,
            options: draft.options,
            correct_option: draft.correct_option,
            duration: draft.duration,
            started_at: wall_now,
            started: now,
            deadline: now + draft.duration,
            responses: IndexMap::new(),
        }
    }

    pub fn id(&self) -> PollId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Scheduled end, `start + duration`.
    pub fn ends_at(&self) -> SystemTime {
        self.started_at + self.duration
    }

    /// Wall-clock time matching a monotonic instant of this poll's lifetime.
    pub fn wall_time_at(&self, now: Instant) -> SystemTime {
        self.started_at + now.saturating_duration_since(self.started)
    }

    /// Milliseconds left before the deadline; zero or negative once it has passed.
    pub fn remaining_ms(&self, now: Instant) -> i64 {
        if now >= self.deadline {
            -(now.duration_since(self.deadline).as_millis() as i64)
        } else {
            self.deadline.duration_since(now).as_millis() as i64
        }
    }

    /// Whether responses are still accepted at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        now < self.deadline
    }

    pub fn responses(&self) -> impl ExactSizeIterator<Item = &Response> {
        self.responses.values()
    }

    pub fn has_answered(&self, participant: &str) -> bool {
        self.responses.contains_key(participant)
    }

    pub fn total_responses(&self) -> usize {
        self.responses.len()
    }

    /// Response count per option, in option order.
    pub fn tallies(&self) -> Vec<u32> {
        let mut tallies = vec![0; self.options.len()];
        for response in self.responses.values() {
            tallies[response.option_index] += 1;
        }
        tallies
    }

    /// Append the answer of `participant`, enforcing one response per name.
    pub fn record_response(
        &mut self,
        participant: &str,
        option_index: i64,
        now: Instant,
    ) -> Result<&Response, CommandError> {
        if self.has_answered(participant) {
            return Err(CommandError::DuplicateResponse(participant.to_owned()));
        }

        let index = usize::try_from(option_index)
            .ok()
            .filter(|index| *index < self.options.len())
            .ok_or(CommandError::InvalidOption {
                index: option_index,
            })?;

        let response = Response {
            participant: participant.to_owned(),
            option_index: index,
            submitted_at: self.wall_time_at(now),
        };
        let (slot, _) = self.responses.insert_full(participant.to_owned(), response);
        Ok(&self.responses[slot])
    }

    /// Persisted form of the poll.
    pub fn to_entity(&self, active: bool, ends_at: SystemTime) -> PollEntity {
        PollEntity {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            correct_option: self.correct_option as u32,
            started_at: self.started_at,
            ends_at,
            active,
            responses: self.response_entities(),
        }
    }

    pub fn response_entities(&self) -> Vec<ResponseEntity> {
        self.responses.values().map(ResponseEntity::from).collect()
    }
}

/// A poll frozen at the moment it stopped accepting responses.
#[derive(Debug, Clone)]
pub struct EndedPoll {
    pub poll: Poll,
    pub reason: EndReason,
    pub ended_at: SystemTime,
}

impl EndedPoll {
    /// Freeze `poll`. Timeouts end exactly at the scheduled deadline.
    pub fn new(poll: Poll, reason: EndReason, now: Instant) -> Self {
        let ended_at = match reason {
            EndReason::Timeout => poll.ends_at(),
            EndReason::Manual | EndReason::Superseded => poll.wall_time_at(now),
        };
        Self {
            poll,
            reason,
            ended_at,
        }
    }

    /// Archived snapshot written to the history collection.
    pub fn history_entry(&self) -> HistoryEntryEntity {
        HistoryEntryEntity {
            id: self.poll.id,
            question: self.poll.question.clone(),
            options: self.poll.options.clone(),
            correct_option: self.poll.correct_option as u32,
            started_at: self.poll.started_at,
            ended_at: self.ended_at,
            end_reason: self.reason.as_str().to_owned(),
            responses: self.poll.response_entities(),
            total_responses: self.poll.total_responses() as u32,
        }
    }

    /// Poll record marked inactive with its frozen end time.
    pub fn poll_entity(&self) -> PollEntity {
        self.poll.to_entity(false, self.ended_at)
    }
}
