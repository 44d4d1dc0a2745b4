use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    dto::{
        history::HistoryPageResponse,
        poll::{PollEndedEvent, PollSnapshot},
        ws::{
            CommandRejectedEvent, RemovedFromSessionEvent, ResponseAcceptedEvent,
            RosterChangedEvent, SessionJoinedEvent,
        },
    },
    error::CommandError,
    state::{
        BroadcastHub,
        poll::{EndedPoll, Poll},
        registry::ConnectionId,
    },
};

pub const EVENT_POLL_STARTED: &str = "pollStarted";
pub const EVENT_POLL_UPDATED: &str = "pollUpdated";
pub const EVENT_POLL_ENDED: &str = "pollEnded";
pub const EVENT_ROSTER_CHANGED: &str = "rosterChanged";
pub const EVENT_HISTORY_CHANGED: &str = "historyChanged";
pub const EVENT_REMOVED_FROM_SESSION: &str = "removedFromSession";
pub const EVENT_COMMAND_REJECTED: &str = "commandRejected";
pub const EVENT_CURRENT_STATE: &str = "currentState";
pub const EVENT_SESSION_JOINED: &str = "sessionJoined";
pub const EVENT_RESPONSE_ACCEPTED: &str = "responseAccepted";

/// Broadcast the full state of a poll that just started.
pub fn broadcast_poll_started(hub: &BroadcastHub, poll: &Poll, now: Instant) {
    hub.broadcast_all(EVENT_POLL_STARTED, &PollSnapshot::capture(poll, now));
}

/// Broadcast the full state of the active poll after a new response.
pub fn broadcast_poll_updated(hub: &BroadcastHub, poll: &Poll, now: Instant) {
    hub.broadcast_all(EVENT_POLL_UPDATED, &PollSnapshot::capture(poll, now));
}

pub fn broadcast_poll_ended(hub: &BroadcastHub, ended: &EndedPoll) {
    hub.broadcast_all(EVENT_POLL_ENDED, &PollEndedEvent::from(ended));
}

/// Broadcast the current set of joined display names.
pub fn broadcast_roster(hub: &BroadcastHub, names: Vec<String>) {
    hub.broadcast_all(EVENT_ROSTER_CHANGED, &RosterChangedEvent { names });
}

/// Broadcast the newest page of history after an append.
pub fn broadcast_history_changed(hub: &BroadcastHub, page: &HistoryPageResponse) {
    hub.broadcast_all(EVENT_HISTORY_CHANGED, page);
}

pub fn notify_removed(hub: &BroadcastHub, connection: ConnectionId) {
    hub.send_to(
        connection,
        EVENT_REMOVED_FROM_SESSION,
        &RemovedFromSessionEvent {},
    );
}

pub fn notify_rejected(hub: &BroadcastHub, connection: ConnectionId, err: &CommandError) {
    hub.send_to(
        connection,
        EVENT_COMMAND_REJECTED,
        &CommandRejectedEvent::from(err),
    );
}

/// Send the active poll snapshot, or `null` when idle.
pub fn send_current_state(
    hub: &BroadcastHub,
    connection: ConnectionId,
    snapshot: Option<PollSnapshot>,
) {
    hub.send_to(connection, EVENT_CURRENT_STATE, &snapshot);
}

pub fn notify_session_joined(hub: &BroadcastHub, connection: ConnectionId, name: &str) {
    hub.send_to(
        connection,
        EVENT_SESSION_JOINED,
        &SessionJoinedEvent {
            name: name.to_owned(),
        },
    );
}

pub fn notify_response_accepted(
    hub: &BroadcastHub,
    connection: ConnectionId,
    poll_id: Uuid,
    option_index: usize,
) {
    hub.send_to(
        connection,
        EVENT_RESPONSE_ACCEPTED,
        &ResponseAcceptedEvent {
            poll_id,
            option_index: option_index as u32,
        },
    );
}
