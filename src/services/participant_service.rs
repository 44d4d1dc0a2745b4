use tracing::{debug, info};

use crate::{
    error::CommandError,
    services::poll_events,
    state::{
        SharedState,
        registry::{ConnectionId, JoinOutcome, normalize_name},
    },
};

/// Register `connection` under a display name.
pub async fn join(
    state: &SharedState,
    connection: ConnectionId,
    raw_name: &str,
) -> Result<JoinOutcome, CommandError> {
    let name = normalize_name(raw_name)?;
    let mut coordinator = state.coordinator().await;
    // a name that answered the live poll is kept until the poll ends
    let answered = coordinator
        .registry
        .name_of(connection)
        .filter(|current| *current != name)
        .filter(|current| {
            coordinator
                .machine
                .active_poll()
                .is_some_and(|poll| poll.has_answered(current))
        });
    if let Some(current) = answered {
        return Err(CommandError::DuplicateResponse(current.to_owned()));
    }
    let outcome = coordinator.registry.join(connection, &name)?;

    if outcome.roster_changed() {
        poll_events::broadcast_roster(state.hub(), coordinator.registry.names());
    }
    poll_events::notify_session_joined(state.hub(), connection, &name);

    match &outcome {
        JoinOutcome::Joined => info!(connection = %connection, name, "participant joined"),
        JoinOutcome::Renamed { previous } => {
            info!(connection = %connection, previous, name, "participant renamed")
        }
        JoinOutcome::Unchanged => debug!(connection = %connection, name, "join repeated"),
    }
    Ok(outcome)
}

/// Ban `name` and detach its connection. Unknown names are ignored.
///
/// The removed connection stays open and may still observe broadcasts.
pub async fn kick(state: &SharedState, raw_name: &str) -> Option<ConnectionId> {
    let name = raw_name.trim();
    let mut coordinator = state.coordinator().await;
    let Some(connection) = coordinator.registry.kick(name) else {
        debug!(name, "kick ignored for unknown participant");
        return None;
    };

    poll_events::notify_removed(state.hub(), connection);
    poll_events::broadcast_roster(state.hub(), coordinator.registry.names());
    info!(connection = %connection, name, "participant removed and banned");
    Some(connection)
}

/// Forget the name held by a closed connection.
pub async fn leave(state: &SharedState, connection: ConnectionId) {
    let mut coordinator = state.coordinator().await;
    if let Some(name) = coordinator.registry.leave(connection) {
        poll_events::broadcast_roster(state.hub(), coordinator.registry.names());
        info!(connection = %connection, name, "participant left");
    }
}
