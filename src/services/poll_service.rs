use std::{sync::Arc, time::SystemTime};

use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    dto::poll::PollSnapshot,
    error::CommandError,
    services::poll_events,
    state::{
        PollCoordinator, SharedState,
        poll::{EndReason, EndedPoll, Poll, PollDraft, PollId},
        registry::ConnectionId,
        scheduler::TimerToken,
        state_machine::PollEvent,
    },
};

/// Start a poll, ending the active one first if there is one.
pub async fn create_poll(state: &SharedState, draft: PollDraft) -> Result<PollId, CommandError> {
    let mut coordinator = state.coordinator().await;
    let now = Instant::now();

    end_active_poll(state, &mut coordinator, EndReason::Superseded, now);

    let poll = Poll::start(draft, now, SystemTime::now());
    let poll_id = poll.id();
    let duration = poll.duration();
    let record = poll.to_entity(true, poll.ends_at());
    coordinator.machine.apply(PollEvent::Start(poll))?;

    let weak = Arc::downgrade(state);
    coordinator
        .scheduler
        .arm(poll_id, duration, move |poll_id, token| async move {
            if let Some(state) = weak.upgrade() {
                expire_poll(&state, poll_id, token).await;
            }
        });

    if let Some(poll) = coordinator.machine.active_poll() {
        poll_events::broadcast_poll_started(state.hub(), poll, now);
    }
    state.persistence().save_poll(record);

    info!(
        poll_id = %poll_id,
        duration_secs = duration.as_secs(),
        "poll started"
    );
    Ok(poll_id)
}

/// Record the answer of the participant registered on `connection`.
pub async fn submit_response(
    state: &SharedState,
    connection: ConnectionId,
    option_index: i64,
) -> Result<(), CommandError> {
    let mut coordinator = state.coordinator().await;
    let now = Instant::now();
    let PollCoordinator {
        machine, registry, ..
    } = &mut *coordinator;

    let poll = machine
        .active_poll_mut()
        .filter(|poll| poll.is_open(now))
        .ok_or(CommandError::NoActivePoll)?;
    let participant = registry
        .name_of(connection)
        .ok_or(CommandError::NotRegistered)?;
    let accepted = poll.record_response(participant, option_index, now)?.option_index;

    poll_events::broadcast_poll_updated(state.hub(), poll, now);
    poll_events::notify_response_accepted(state.hub(), connection, poll.id(), accepted);
    state
        .persistence()
        .upsert_responses(poll.id(), poll.response_entities());

    debug!(poll_id = %poll.id(), participant, option = accepted, "response recorded");
    Ok(())
}

/// End the active poll on the presenter's request.
pub async fn end_poll(state: &SharedState) -> Result<PollId, CommandError> {
    let mut coordinator = state.coordinator().await;
    end_active_poll(state, &mut coordinator, EndReason::Manual, Instant::now())
        .map(|ended| ended.poll.id())
        .ok_or(CommandError::NoActivePoll)
}

/// Timer callback. Ends the poll only if `token` is still the timer armed for `poll_id`.
pub async fn expire_poll(state: &SharedState, poll_id: PollId, token: TimerToken) {
    let mut coordinator = state.coordinator().await;
    let live = coordinator.machine.active_poll().map(Poll::id);
    if live != Some(poll_id) || !coordinator.scheduler.is_armed(poll_id, token) {
        debug!(poll_id = %poll_id, "stale deadline ignored");
        return;
    }

    coordinator.scheduler.release(token);
    end_active_poll(state, &mut coordinator, EndReason::Timeout, Instant::now());
}

/// Snapshot of the active poll, with possibly non-positive remaining time.
pub async fn active_snapshot(state: &SharedState) -> Option<PollSnapshot> {
    let coordinator = state.coordinator().await;
    coordinator
        .machine
        .active_poll()
        .map(|poll| PollSnapshot::capture(poll, Instant::now()))
}

/// Answer `requestCurrentState` on `connection`.
pub async fn send_current_state(state: &SharedState, connection: ConnectionId) {
    let coordinator = state.coordinator().await;
    let snapshot = coordinator
        .machine
        .active_poll()
        .map(|poll| PollSnapshot::capture(poll, Instant::now()));
    poll_events::send_current_state(state.hub(), connection, snapshot);
}

/// Shared end path for manual, timeout and superseded ends. A no-op when idle.
///
/// Broadcasts `pollEnded` before any durable write is queued.
fn end_active_poll(
    state: &SharedState,
    coordinator: &mut PollCoordinator,
    reason: EndReason,
    now: Instant,
) -> Option<EndedPoll> {
    let ended = coordinator.machine.end(reason, now)?;
    coordinator.scheduler.cancel_armed();

    poll_events::broadcast_poll_ended(state.hub(), &ended);

    let archive = reason != EndReason::Superseded || state.config().archive_superseded_polls;
    if archive {
        state.persistence().append_history(ended.history_entry());
    }
    state.persistence().save_poll(ended.poll_entity());

    info!(
        poll_id = %ended.poll.id(),
        reason = reason.as_str(),
        responses = ended.poll.total_responses(),
        archived = archive,
        "poll ended"
    );
    Some(ended)
}
