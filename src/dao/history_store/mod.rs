pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{HistoryEntryEntity, HistoryPageEntity, PollEntity, ResponseEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the durable side of the poll lifecycle.
///
/// Every write is advisory: callers log failures and never roll back live state.
pub trait HistoryStore: Send + Sync {
    /// Insert or replace the running/ended poll record.
    fn save_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the stored response list of a poll.
    fn upsert_responses(
        &self,
        poll_id: Uuid,
        responses: Vec<ResponseEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Append the archived snapshot of an ended poll.
    fn append_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch `limit` entries after skipping `offset`, newest start time first.
    fn list_history(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<HistoryPageEntity>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection in place after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
