use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

/// Subscribe to the public SSE stream mirroring every session broadcast.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events until the
/// client disconnects. `first` is sent to this subscriber only, before any broadcast.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: Option<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(payload) = first {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "public SSE subscriber lagging, skipping events");
                            continue;
                        }
                    }
                }
            }
        }

        info!("public SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Greeting for a new public subscriber, with the current degraded flag.
pub fn handshake(degraded: bool) -> Option<ServerEvent> {
    let handshake = Handshake {
        stream: "public".into(),
        message: "public stream connected".into(),
        degraded,
    };
    ServerEvent::json(Some("handshake".to_string()), &handshake).ok()
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use futures::StreamExt;
    use serde_json::Value;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    async fn next_chunk<S>(body: &mut S) -> String
    where
        S: Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin,
    {
        let bytes = body.next().await.unwrap().unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn handshake_reaches_only_the_new_subscriber() {
        let state = AppState::new(AppConfig::default());
        let mut existing = subscribe_public(&state);

        let greeting = handshake(state.is_degraded().await);
        let response = to_sse_stream(subscribe_public(&state), greeting).into_response();
        let mut body = response.into_body().into_data_stream();

        let first = next_chunk(&mut body).await;
        assert!(first.lines().any(|line| line == "event: handshake"), "{first}");
        let data = first
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let greeting: Value = serde_json::from_str(data).unwrap();
        assert_eq!(greeting["degraded"], true);
        assert!(existing.try_recv().is_err());

        state
            .hub()
            .broadcast_all("rosterChanged", &serde_json::json!({"names": []}));
        let mirrored = existing.recv().await.unwrap();
        assert_eq!(mirrored.event.as_deref(), Some("rosterChanged"));
        assert_eq!(mirrored.data, r#"{"names":[]}"#);

        let forwarded = next_chunk(&mut body).await;
        assert!(
            forwarded.lines().any(|line| line == "event: rosterChanged"),
            "{forwarded}"
        );
    }
}
