use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoHistoryDocument, MongoPollDocument, doc_id, responses_as_bson},
};
use crate::dao::{
    history_store::HistoryStore,
    models::{HistoryEntryEntity, HistoryPageEntity, PollEntity, ResponseEntity},
    storage::StorageResult,
};

const POLL_COLLECTION_NAME: &str = "polls";
const HISTORY_COLLECTION_NAME: &str = "poll_history";

/// MongoDB-backed [`HistoryStore`] implementation.
#[derive(Clone)]
pub struct MongoHistoryStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoHistoryStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.history_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"started_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("history_started_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: HISTORY_COLLECTION_NAME,
                index: "started_at",
                source,
            })?;

        Ok(())
    }

    async fn poll_collection(&self) -> Collection<MongoPollDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPollDocument>(POLL_COLLECTION_NAME)
    }

    async fn history_collection(&self) -> Collection<MongoHistoryDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoHistoryDocument>(HISTORY_COLLECTION_NAME)
    }

    async fn save_poll(&self, poll: PollEntity) -> MongoResult<()> {
        let id = poll.id;
        let document: MongoPollDocument = poll.into();
        let collection = self.poll_collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePoll { id, source })?;

        Ok(())
    }

    async fn upsert_responses(&self, id: Uuid, responses: Vec<ResponseEntity>) -> MongoResult<()> {
        let collection = self.poll_collection().await;
        collection
            .update_one(
                doc_id(id),
                doc! { "$set": { "responses": responses_as_bson(responses) } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::UpdateResponses { id, source })?;

        Ok(())
    }

    async fn append_history(&self, entry: HistoryEntryEntity) -> MongoResult<()> {
        let id = entry.id;
        let document: MongoHistoryDocument = entry.into();
        let collection = self.history_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendHistory { id, source })?;

        Ok(())
    }

    async fn list_history(&self, offset: u64, limit: u64) -> MongoResult<HistoryPageEntity> {
        let collection = self.history_collection().await;

        let documents: Vec<MongoHistoryDocument> = collection
            .find(doc! {})
            .sort(doc! {"started_at": -1})
            .skip(offset)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::ListHistory { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListHistory { source })?;

        let total = collection
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListHistory { source })?;

        let entries = documents
            .into_iter()
            .map(HistoryEntryEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(HistoryPageEntity { entries, total })
    }
}

impl HistoryStore for MongoHistoryStore {
    fn save_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_poll(poll).await.map_err(Into::into) })
    }

    fn upsert_responses(
        &self,
        poll_id: Uuid,
        responses: Vec<ResponseEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_responses(poll_id, responses)
                .await
                .map_err(Into::into)
        })
    }

    fn append_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_history(entry).await.map_err(Into::into) })
    }

    fn list_history(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<HistoryPageEntity>> {
        let store = self.clone();
        Box::pin(async move { store.list_history(offset, limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
