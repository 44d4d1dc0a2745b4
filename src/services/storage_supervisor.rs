use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{history_store::HistoryStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a history store installed while the backend is reachable, degraded mode otherwise.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn HistoryStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_history_store(store.clone()).await;
                info!("history store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !watch(&state, &store).await {
                    warn!("exhausted history store reconnect attempts; staying in degraded mode");
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "history store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store health until reconnecting fails `MAX_RECONNECT_ATTEMPTS` times in a row.
async fn watch(state: &SharedState, store: &Arc<dyn HistoryStore>) -> bool {
    loop {
        if store.health_check().await.is_ok() {
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "history store reconnected after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "history store reconnect failed; entering degraded mode"
                        );
                        state.clear_history_store().await;
                    } else {
                        warn!(attempt, error = %err, "history store reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            return false;
        }
        if state.is_degraded().await {
            info!("history store healthy again; leaving degraded mode");
            state.install_history_store(store.clone()).await;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            history_store::memory::MemoryHistoryStore,
            models::{HistoryEntryEntity, HistoryPageEntity, PollEntity, ResponseEntity},
            storage::StorageResult,
        },
        state::AppState,
    };

    /// Memory store whose health check fails a fixed number of times.
    #[derive(Clone)]
    struct FlakyStore {
        inner: MemoryHistoryStore,
        failures_left: Arc<AtomicU32>,
        reconnect_ok: bool,
    }

    impl FlakyStore {
        fn new(failures: u32, reconnect_ok: bool) -> Self {
            Self {
                inner: MemoryHistoryStore::new(),
                failures_left: Arc::new(AtomicU32::new(failures)),
                reconnect_ok,
            }
        }
    }

    fn refused() -> StorageError {
        StorageError::unavailable(
            "ping failed".into(),
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        )
    }

    impl HistoryStore for FlakyStore {
        fn save_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_poll(poll)
        }

        fn upsert_responses(
            &self,
            poll_id: Uuid,
            responses: Vec<ResponseEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.upsert_responses(poll_id, responses)
        }

        fn append_history(
            &self,
            entry: HistoryEntryEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.append_history(entry)
        }

        fn list_history(
            &self,
            offset: u64,
            limit: u64,
        ) -> BoxFuture<'static, StorageResult<HistoryPageEntity>> {
            self.inner.list_history(offset, limit)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let failures_left = self.failures_left.clone();
            Box::pin(async move {
                let failing = failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if failing { Err(refused()) } else { Ok(()) }
            })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            let ok = self.reconnect_ok;
            Box::pin(async move { if ok { Ok(()) } else { Err(refused()) } })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn installs_the_store_once_connected() {
        let state = AppState::new(AppConfig::default());
        let store = FlakyStore::new(0, true);
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn HistoryStore>) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded().await);
        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnects_enter_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store: Arc<dyn HistoryStore> = Arc::new(FlakyStore::new(u32::MAX, false));
        state.install_history_store(store.clone()).await;

        assert!(!watch(&state, &store).await);
        assert!(state.is_degraded().await);
    }

    #[tokio::test(start_paused = true)]
    async fn a_successful_reconnect_keeps_the_store() {
        let state = AppState::new(AppConfig::default());
        let store: Arc<dyn HistoryStore> = Arc::new(FlakyStore::new(1, true));
        state.install_history_store(store.clone()).await;

        let watcher = tokio::spawn({
            let state = state.clone();
            async move { watch(&state, &store).await }
        });
        sleep(HEALTH_POLL_INTERVAL * 2).await;

        assert!(!state.is_degraded().await);
        assert!(!watcher.is_finished());
        watcher.abort();
    }
}
