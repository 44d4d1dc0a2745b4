//! Process-local history backend, used when no database is configured and by tests.

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    history_store::HistoryStore,
    models::{HistoryEntryEntity, HistoryPageEntity, PollEntity, ResponseEntity},
    storage::{StorageError, StorageResult},
};

/// [`HistoryStore`] keeping every record in memory for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    polls: HashMap<Uuid, PollEntity>,
    history: Vec<HistoryEntryEntity>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored poll record.
    pub async fn poll(&self, id: Uuid) -> Option<PollEntity> {
        self.inner.read().await.polls.get(&id).cloned()
    }

    /// Number of archived entries.
    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.polls.insert(poll.id, poll);
            Ok(())
        })
    }

    fn upsert_responses(
        &self,
        poll_id: Uuid,
        responses: Vec<ResponseEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let poll = guard
                .polls
                .get_mut(&poll_id)
                .ok_or(StorageError::NotFound {
                    entity: "poll",
                    id: poll_id,
                })?;
            poll.responses = responses;
            Ok(())
        })
    }

    fn append_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            if guard.history.iter().any(|existing| existing.id == entry.id) {
                return Err(StorageError::Conflict {
                    entity: "history entry",
                    id: entry.id,
                });
            }
            guard.history.push(entry);
            Ok(())
        })
    }

    fn list_history(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<HistoryPageEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut sorted: Vec<&HistoryEntryEntity> = guard.history.iter().collect();
            sorted.sort_by_key(|entry| Reverse(entry.started_at));

            let entries = sorted
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect();

            Ok(HistoryPageEntity {
                entries,
                total: guard.history.len() as u64,
            })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn entry(started_secs: u64) -> HistoryEntryEntity {
        let started_at = SystemTime::UNIX_EPOCH + Duration::from_secs(started_secs);
        HistoryEntryEntity {
            id: Uuid::new_v4(),
            question: format!("question {started_secs}"),
            options: vec!["A".into(), "B".into()],
            correct_option: 0,
            started_at,
            ended_at: started_at + Duration::from_secs(5),
            end_reason: "timeout".into(),
            responses: Vec::new(),
            total_responses: 0,
        }
    }

    #[tokio::test]
    async fn history_is_listed_newest_first_with_paging() {
        let store = MemoryHistoryStore::new();
        for secs in [10, 30, 20, 40] {
            store.append_history(entry(secs)).await.unwrap();
        }

        let first = store.list_history(0, 3).await.unwrap();
        assert_eq!(first.total, 4);
        let questions: Vec<_> = first.entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, ["question 40", "question 30", "question 20"]);

        let second = store.list_history(3, 3).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].question, "question 10");
    }

    #[tokio::test]
    async fn history_entries_are_written_once() {
        let store = MemoryHistoryStore::new();
        let archived = entry(1);
        store.append_history(archived.clone()).await.unwrap();

        let err = store.append_history(archived).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(store.history_len().await, 1);
    }

    #[tokio::test]
    async fn upserting_responses_of_unknown_poll_fails() {
        let store = MemoryHistoryStore::new();
        let err = store
            .upsert_responses(Uuid::new_v4(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
