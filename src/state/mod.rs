pub mod hub;
pub mod poll;
pub mod registry;
pub mod scheduler;
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::{
    config::AppConfig, dao::history_store::HistoryStore, error::ServiceError,
    services::persistence::PersistenceQueue,
};

pub use self::hub::{BroadcastHub, ClientConnection, SseHub};
use self::{registry::ParticipantRegistry, scheduler::DeadlineScheduler, state_machine::PollStateMachine};

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Everything a session command may touch, guarded by one lock.
#[derive(Debug, Default)]
pub struct PollCoordinator {
    /// Live poll slot and its lifecycle.
    pub machine: PollStateMachine,
    /// Joined participants and banned names.
    pub registry: ParticipantRegistry,
    /// Deadline timer of the live poll.
    pub scheduler: DeadlineScheduler,
}

/// Central application state: the poll coordinator, connected clients and the history store.
pub struct AppState {
    coordinator: Mutex<PollCoordinator>,
    hub: BroadcastHub,
    history_store: RwLock<Option<Arc<dyn HistoryStore>>>,
    persistence: PersistenceQueue,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] and start its persistence worker.
    ///
    /// The application starts in degraded mode until a history store is installed.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new_cyclic(|weak| Self {
            coordinator: Mutex::new(PollCoordinator::default()),
            hub: BroadcastHub::new(SSE_CAPACITY),
            history_store: RwLock::new(None),
            persistence: PersistenceQueue::spawn(weak.clone()),
            config: Arc::new(config),
        })
    }

    /// Enter the exclusive section in which session commands are applied.
    pub async fn coordinator(&self) -> MutexGuard<'_, PollCoordinator> {
        self.coordinator.lock().await
    }

    /// Connected WebSocket clients and the public SSE mirror.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.hub.public_sse()
    }

    /// Ordered queue of durable writes.
    pub fn persistence(&self) -> &PersistenceQueue {
        &self.persistence
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current history store, if one is installed.
    pub async fn history_store(&self) -> Option<Arc<dyn HistoryStore>> {
        let guard = self.history_store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`AppState::history_store`], failing with [`ServiceError::Degraded`] when absent.
    pub async fn require_history_store(&self) -> Result<Arc<dyn HistoryStore>, ServiceError> {
        self.history_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new history store implementation and leave degraded mode.
    pub async fn install_history_store(&self, store: Arc<dyn HistoryStore>) {
        let mut guard = self.history_store.write().await;
        *guard = Some(store);
    }

    /// Remove the current history store and enter degraded mode.
    pub async fn clear_history_store(&self) {
        let mut guard = self.history_store.write().await;
        guard.take();
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.history_store.read().await;
        guard.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::history_store::memory::MemoryHistoryStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_history_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_history_store(Arc::new(MemoryHistoryStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(state.require_history_store().await.is_ok());

        state.clear_history_store().await;
        assert!(state.is_degraded().await);
        assert!(state.history_store().await.is_none());
    }
}
