use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::{
    dto::{sse::ServerEvent, ws::OutboundFrame},
    state::registry::ConnectionId,
};

#[derive(Clone)]
/// Handle used to push frames to a connected WebSocket client.
pub struct ClientConnection {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Broadcast channel feeding every public SSE subscriber.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// Fan-out of session events to WebSocket clients, mirrored onto the public SSE stream.
///
/// Delivery is a single non-blocking attempt per client. Frames queue in each client's
/// unbounded channel, so a client sees events in the order they were emitted.
pub struct BroadcastHub {
    clients: DashMap<ConnectionId, ClientConnection>,
    public: SseHub,
}

impl BroadcastHub {
    pub fn new(sse_capacity: usize) -> Self {
        Self {
            clients: DashMap::new(),
            public: SseHub::new(sse_capacity),
        }
    }

    /// Start delivering events to `connection`.
    pub fn register(&self, connection: ClientConnection) {
        self.clients.insert(connection.id, connection);
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.clients.remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn public_sse(&self) -> &SseHub {
        &self.public
    }

    /// Send `payload` as `event` to every connected client and to SSE subscribers.
    pub fn broadcast_all<T>(&self, event: &str, payload: &T)
    where
        T: ?Sized + Serialize,
    {
        let Some((frame, data)) = encode(event, payload) else {
            return;
        };

        let closed: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|entry| entry.tx.send(Message::Text(frame.clone().into())).is_err())
            .map(|entry| *entry.key())
            .collect();
        for id in closed {
            debug!(connection = %id, event, "dropping closed client");
            self.clients.remove(&id);
        }

        self.public.broadcast(ServerEvent::new(event.to_string(), data));
    }

    /// Send `payload` as `event` to a single client. Returns whether it was queued.
    pub fn send_to<T>(&self, id: ConnectionId, event: &str, payload: &T) -> bool
    where
        T: ?Sized + Serialize,
    {
        let Some((frame, _)) = encode(event, payload) else {
            return false;
        };

        let Some(tx) = self.clients.get(&id).map(|entry| entry.tx.clone()) else {
            debug!(connection = %id, event, "targeted event for unknown client dropped");
            return false;
        };

        if tx.send(Message::Text(frame.into())).is_err() {
            debug!(connection = %id, event, "dropping closed client");
            self.clients.remove(&id);
            return false;
        }
        true
    }
}

/// Serialize the WebSocket frame and the bare payload used by SSE.
fn encode<T>(event: &str, payload: &T) -> Option<(String, String)>
where
    T: ?Sized + Serialize,
{
    let encoded = serde_json::to_string(&OutboundFrame {
        event,
        data: payload,
    })
    .and_then(|frame| Ok((frame, serde_json::to_string(payload)?)));

    match encoded {
        Ok(encoded) => Some(encoded),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize event payload");
            None
        }
    }
}
