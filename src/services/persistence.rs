//! Ordered write-behind queue between the poll coordinator and the history store.
//!
//! Jobs are enqueued without blocking while the coordinator lock is held and executed
//! one at a time, in order, by a background task. Failures are logged and never reach
//! the live session.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        history_store::HistoryStore,
        models::{HistoryEntryEntity, PollEntity, ResponseEntity},
    },
    services::{history_service, poll_events},
    state::AppState,
};

/// Durable write requested by the coordinator.
#[derive(Debug)]
pub enum PersistenceJob {
    /// Insert or replace a poll record.
    SavePoll(PollEntity),
    /// Replace the response list of a poll.
    UpsertResponses {
        /// Poll the responses belong to.
        poll_id: Uuid,
        /// Full response list in submission order.
        responses: Vec<ResponseEntity>,
    },
    /// Archive an ended poll.
    AppendHistory(HistoryEntryEntity),
    /// Acknowledge once every earlier job was attempted.
    Flush(oneshot::Sender<()>),
}

impl PersistenceJob {
    fn kind(&self) -> &'static str {
        match self {
            PersistenceJob::SavePoll(_) => "save_poll",
            PersistenceJob::UpsertResponses { .. } => "upsert_responses",
            PersistenceJob::AppendHistory(_) => "append_history",
            PersistenceJob::Flush(_) => "flush",
        }
    }
}

/// Sending side of the persistence worker.
#[derive(Clone)]
pub struct PersistenceQueue {
    tx: mpsc::UnboundedSender<PersistenceJob>,
}

impl PersistenceQueue {
    /// Spawn the worker. It stops once the application state is dropped.
    pub fn spawn(state: Weak<AppState>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(state, rx));
        Self { tx }
    }

    pub fn save_poll(&self, poll: PollEntity) {
        self.enqueue(PersistenceJob::SavePoll(poll));
    }

    pub fn upsert_responses(&self, poll_id: Uuid, responses: Vec<ResponseEntity>) {
        self.enqueue(PersistenceJob::UpsertResponses { poll_id, responses });
    }

    pub fn append_history(&self, entry: HistoryEntryEntity) {
        self.enqueue(PersistenceJob::AppendHistory(entry));
    }

    /// Wait until every job enqueued before this call was attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(PersistenceJob::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn enqueue(&self, job: PersistenceJob) {
        if let Err(err) = self.tx.send(job) {
            warn!(job = err.0.kind(), "persistence worker stopped; dropping job");
        }
    }
}

async fn run(state: Weak<AppState>, mut rx: mpsc::UnboundedReceiver<PersistenceJob>) {
    while let Some(job) = rx.recv().await {
        if let PersistenceJob::Flush(done) = job {
            let _ = done.send(());
            continue;
        }

        let Some(state) = state.upgrade() else {
            break;
        };
        let Some(store) = state.history_store().await else {
            warn!(
                job = job.kind(),
                "history store unavailable (degraded mode); dropping write"
            );
            continue;
        };
        execute(&state, &store, job).await;
    }
    debug!("persistence worker stopped");
}

async fn execute(state: &Arc<AppState>, store: &Arc<dyn HistoryStore>, job: PersistenceJob) {
    match job {
        PersistenceJob::SavePoll(poll) => {
            let poll_id = poll.id;
            if let Err(err) = store.save_poll(poll).await {
                warn!(poll_id = %poll_id, error = %err, "failed to save poll");
            }
        }
        PersistenceJob::UpsertResponses { poll_id, responses } => {
            let count = responses.len();
            if let Err(err) = store.upsert_responses(poll_id, responses).await {
                warn!(poll_id = %poll_id, responses = count, error = %err, "failed to store responses");
            }
        }
        PersistenceJob::AppendHistory(entry) => {
            let poll_id = entry.id;
            match store.append_history(entry).await {
                Ok(()) => {
                    info!(poll_id = %poll_id, "poll archived");
                    publish_history(state, store).await;
                }
                Err(err) => {
                    warn!(poll_id = %poll_id, error = %err, "failed to archive poll");
                }
            }
        }
        PersistenceJob::Flush(done) => {
            let _ = done.send(());
        }
    }
}

/// Push the first history page to every client after a successful append.
async fn publish_history(state: &Arc<AppState>, store: &Arc<dyn HistoryStore>) {
    let page_size = state.config().history_page_size;
    match history_service::fetch_page(store, 1, page_size).await {
        Ok(page) => poll_events::broadcast_history_changed(state.hub(), &page),
        Err(err) => warn!(error = %err, "failed to load history after archiving"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{Duration, SystemTime};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            history_store::memory::MemoryHistoryStore,
            models::HistoryPageEntity,
            storage::{StorageError, StorageResult},
        },
        state::hub::tests::{connect, drain},
    };

    /// Store whose writes always fail.
    pub(crate) struct FailingStore;

    fn failure() -> StorageError {
        StorageError::unavailable(
            "connection refused".into(),
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        )
    }

    impl HistoryStore for FailingStore {
        fn save_poll(&self, _poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(failure()) })
        }

        fn upsert_responses(
            &self,
            _poll_id: Uuid,
            _responses: Vec<ResponseEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(failure()) })
        }

        fn append_history(
            &self,
            _entry: HistoryEntryEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(failure()) })
        }

        fn list_history(
            &self,
            _offset: u64,
            _limit: u64,
        ) -> BoxFuture<'static, StorageResult<HistoryPageEntity>> {
            Box::pin(async { Err(failure()) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(failure()) })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(failure()) })
        }
    }

    fn poll_entity() -> PollEntity {
        PollEntity {
            id: Uuid::new_v4(),
            question: "Coffee or tea?".into(),
            options: vec!["coffee".into(), "tea".into()],
            correct_option: 0,
            started_at: SystemTime::UNIX_EPOCH,
            ends_at: SystemTime::UNIX_EPOCH + Duration::from_secs(30),
            active: true,
            responses: Vec::new(),
        }
    }

    fn response(name: &str) -> ResponseEntity {
        ResponseEntity {
            participant: name.into(),
            option_index: 1,
            submitted_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn history_entry(poll: &PollEntity) -> HistoryEntryEntity {
        HistoryEntryEntity {
            id: poll.id,
            question: poll.question.clone(),
            options: poll.options.clone(),
            correct_option: poll.correct_option,
            started_at: poll.started_at,
            ended_at: poll.ends_at,
            end_reason: "timeout".into(),
            responses: poll.responses.clone(),
            total_responses: poll.responses.len() as u32,
        }
    }

    #[tokio::test]
    async fn jobs_are_applied_in_order() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryHistoryStore::new();
        state.install_history_store(Arc::new(store.clone())).await;

        let poll = poll_entity();
        let queue = state.persistence();
        queue.save_poll(poll.clone());
        queue.upsert_responses(poll.id, vec![response("alice")]);
        queue.upsert_responses(poll.id, vec![response("alice"), response("bob")]);
        queue.flush().await;

        let stored = store.poll(poll.id).await.unwrap();
        let names: Vec<_> = stored.responses.iter().map(|r| r.participant.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn archiving_broadcasts_the_first_history_page() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryHistoryStore::new();
        state.install_history_store(Arc::new(store.clone())).await;
        let (_, mut client) = connect(state.hub());

        let poll = poll_entity();
        state.persistence().append_history(history_entry(&poll));
        state.persistence().flush().await;

        assert_eq!(store.history_len().await, 1);
        let frames = drain(&mut client);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, "historyChanged");
        assert_eq!(frames[0].1["totalCount"], 1);
        assert_eq!(frames[0].1["entries"][0]["pollId"], poll.id.to_string());
    }

    #[tokio::test]
    async fn degraded_mode_drops_jobs_without_blocking() {
        let state = AppState::new(AppConfig::default());
        let (_, mut client) = connect(state.hub());

        state.persistence().append_history(history_entry(&poll_entity()));
        state.persistence().flush().await;

        assert!(drain(&mut client).is_empty());
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_later_jobs_still_run() {
        let state = AppState::new(AppConfig::default());
        state.install_history_store(Arc::new(FailingStore)).await;
        let (_, mut client) = connect(state.hub());

        let poll = poll_entity();
        state.persistence().save_poll(poll.clone());
        state.persistence().append_history(history_entry(&poll));
        state.persistence().flush().await;
        assert!(drain(&mut client).is_empty());

        let store = MemoryHistoryStore::new();
        state.install_history_store(Arc::new(store.clone())).await;
        state.persistence().save_poll(poll.clone());
        state.persistence().flush().await;
        assert!(store.poll(poll.id).await.is_some());
    }
}
