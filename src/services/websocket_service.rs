use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::InboundCommand,
    error::CommandError,
    services::{participant_service, poll_events, poll_service},
    state::{ClientConnection, SharedState, poll::PollDraft, registry::ConnectionId},
};

/// Handle the full lifecycle of one presenter or participant WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.hub().register(ClientConnection {
        id: connection_id,
        tx: outbound_tx.clone(),
    });
    info!(connection = %connection_id, clients = state.hub().client_count(), "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection_id, payload = %text, "received command");
                handle_text(&state, connection_id, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                let err = CommandError::Malformed("binary frames are not supported".into());
                reject(&state, connection_id, &err);
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    participant_service::leave(&state, connection_id).await;
    state.hub().unregister(connection_id);
    info!(connection = %connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Apply one text frame, answering the issuer with `commandRejected` on failure.
pub async fn handle_text(state: &SharedState, connection: ConnectionId, text: &str) {
    if let Err(err) = dispatch(state, connection, text).await {
        reject(state, connection, &err);
    }
}

async fn dispatch(
    state: &SharedState,
    connection: ConnectionId,
    text: &str,
) -> Result<(), CommandError> {
    match InboundCommand::from_json_str(text)? {
        InboundCommand::CreatePoll(command) => {
            let draft = PollDraft::try_from(command)?;
            poll_service::create_poll(state, draft).await?;
        }
        InboundCommand::SubmitResponse { option_index } => {
            poll_service::submit_response(state, connection, option_index).await?;
        }
        InboundCommand::EndPoll => {
            poll_service::end_poll(state).await?;
        }
        InboundCommand::JoinSession { name } => {
            participant_service::join(state, connection, &name).await?;
        }
        InboundCommand::KickParticipant { name } => {
            participant_service::kick(state, &name).await;
        }
        InboundCommand::RequestCurrentState => {
            poll_service::send_current_state(state, connection).await;
        }
        InboundCommand::Unknown => {
            return Err(CommandError::Malformed("unknown command type".into()));
        }
    }
    Ok(())
}

fn reject(state: &SharedState, connection: ConnectionId, err: &CommandError) {
    warn!(
        connection = %connection,
        reason = err.reason(),
        error = %err,
        "command rejected"
    );
    poll_events::notify_rejected(state.hub(), connection, err);
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        config::AppConfig,
        state::{
            AppState,
            hub::tests::{connect, drain, events},
        },
    };

    fn rejection(frames: &[(String, Value)]) -> &Value {
        assert_eq!(frames.len(), 1, "expected a single frame, got {frames:?}");
        assert_eq!(frames[0].0, "commandRejected");
        &frames[0].1
    }

    fn create_poll(duration: i64) -> String {
        json!({
            "type": "createPoll",
            "question": "Best editor?",
            "options": ["vim", "emacs"],
            "correctOption": 0,
            "durationSeconds": duration,
        })
        .to_string()
    }

    #[tokio::test]
    async fn malformed_frames_are_rejected_to_the_issuer_only() {
        let state = AppState::new(AppConfig::default());
        let (issuer, mut issuer_rx) = connect(state.hub());
        let (_, mut observer) = connect(state.hub());

        for frame in [
            "not json",
            r#"{"type": "launchRocket"}"#,
            r#"{"question": "no type"}"#,
            r#"{"type": "submitResponse", "optionIndex": "one"}"#,
        ] {
            handle_text(&state, issuer, frame).await;
            let frames = drain(&mut issuer_rx);
            let rejected = rejection(&frames);
            assert_eq!(rejected["reason"], "malformedCommand");
            assert_eq!(rejected["category"], "validation");
        }
        assert!(drain(&mut observer).is_empty());
    }

    #[tokio::test]
    async fn invalid_polls_are_rejected_before_any_broadcast() {
        let state = AppState::new(AppConfig::default());
        let (presenter, mut presenter_rx) = connect(state.hub());

        let one_option = json!({
            "type": "createPoll",
            "question": "Yes?",
            "options": ["yes"],
            "correctOption": 0,
            "durationSeconds": 30,
        });
        handle_text(&state, presenter, &one_option.to_string()).await;
        assert_eq!(rejection(&drain(&mut presenter_rx))["reason"], "invalidPoll");

        handle_text(&state, presenter, &create_poll(0)).await;
        assert_eq!(rejection(&drain(&mut presenter_rx))["reason"], "invalidPoll");

        handle_text(&state, presenter, &create_poll(-5)).await;
        assert_eq!(
            rejection(&drain(&mut presenter_rx))["reason"],
            "malformedCommand"
        );

        assert!(state.coordinator().await.machine.active_poll().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_drive_a_whole_poll() {
        let state = AppState::new(AppConfig::default());
        let (presenter, mut presenter_rx) = connect(state.hub());
        let (alice, mut alice_rx) = connect(state.hub());

        handle_text(&state, alice, r#"{"type": "joinSession", "name": "alice"}"#).await;
        handle_text(&state, presenter, &create_poll(60)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        handle_text(&state, alice, r#"{"type": "submitResponse", "optionIndex": 1}"#).await;
        handle_text(&state, presenter, r#"{"type": "endPoll"}"#).await;

        assert_eq!(
            events(&mut alice_rx),
            vec![
                "rosterChanged",
                "sessionJoined",
                "pollStarted",
                "pollUpdated",
                "responseAccepted",
                "pollEnded"
            ]
        );
        assert_eq!(
            events(&mut presenter_rx),
            vec!["rosterChanged", "pollStarted", "pollUpdated", "pollEnded"]
        );

        handle_text(&state, presenter, r#"{"type": "endPoll"}"#).await;
        let frames = drain(&mut presenter_rx);
        let rejected = rejection(&frames);
        assert_eq!(rejected["reason"], "noActivePoll");
        assert_eq!(rejected["category"], "protocol");
    }

    #[tokio::test]
    async fn negative_option_index_is_an_invalid_option() {
        let state = AppState::new(AppConfig::default());
        let (alice, mut alice_rx) = connect(state.hub());
        handle_text(&state, alice, r#"{"type": "joinSession", "name": "alice"}"#).await;
        handle_text(&state, alice, &create_poll(60)).await;
        drain(&mut alice_rx);

        handle_text(&state, alice, r#"{"type": "submitResponse", "optionIndex": -1}"#).await;
        assert_eq!(rejection(&drain(&mut alice_rx))["reason"], "invalidOption");
    }

    #[tokio::test]
    async fn kicked_participant_is_told_and_cannot_answer() {
        let state = AppState::new(AppConfig::default());
        let (presenter, mut presenter_rx) = connect(state.hub());
        let (mallory, mut mallory_rx) = connect(state.hub());

        handle_text(&state, mallory, r#"{"type": "joinSession", "name": "mallory"}"#).await;
        handle_text(&state, presenter, &create_poll(60)).await;
        handle_text(&state, presenter, r#"{"type": "kickParticipant", "name": "mallory"}"#).await;
        drain(&mut presenter_rx);
        assert!(events(&mut mallory_rx).contains(&"removedFromSession".to_string()));

        handle_text(&state, mallory, r#"{"type": "submitResponse", "optionIndex": 0}"#).await;
        assert_eq!(rejection(&drain(&mut mallory_rx))["reason"], "notRegistered");

        handle_text(&state, mallory, r#"{"type": "joinSession", "name": "mallory"}"#).await;
        assert_eq!(rejection(&drain(&mut mallory_rx))["reason"], "banned");
        assert!(drain(&mut presenter_rx).is_empty());
    }

    #[tokio::test]
    async fn current_state_request_answers_the_issuer() {
        let state = AppState::new(AppConfig::default());
        let (client, mut client_rx) = connect(state.hub());

        handle_text(&state, client, r#"{"type": "requestCurrentState"}"#).await;
        assert_eq!(
            drain(&mut client_rx),
            vec![("currentState".to_string(), Value::Null)]
        );
    }
}
