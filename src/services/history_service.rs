use std::sync::Arc;

use crate::{
    dao::history_store::HistoryStore,
    dto::history::{HistoryPageResponse, HistoryQuery},
    error::ServiceError,
    state::SharedState,
};

/// Resolve the page and page size of a history query against the configured bounds.
pub fn resolve_paging(state: &SharedState, query: &HistoryQuery) -> Result<(u64, u64), ServiceError> {
    let config = state.config();
    let page = query.page.unwrap_or(1);
    let page_size = query.limit.unwrap_or(config.history_page_size);

    if page == 0 {
        return Err(ServiceError::InvalidInput("page starts at 1".into()));
    }
    if page_size == 0 || page_size > config.max_history_page_size {
        return Err(ServiceError::InvalidInput(format!(
            "limit must be between 1 and {}",
            config.max_history_page_size
        )));
    }
    Ok((page, page_size))
}

/// List archived polls, newest start time first.
pub async fn list_history(
    state: &SharedState,
    query: &HistoryQuery,
) -> Result<HistoryPageResponse, ServiceError> {
    let (page, page_size) = resolve_paging(state, query)?;
    let store = state.require_history_store().await?;
    fetch_page(&store, page, page_size).await
}

/// Read one page from `store`.
pub async fn fetch_page(
    store: &Arc<dyn HistoryStore>,
    page: u64,
    page_size: u64,
) -> Result<HistoryPageResponse, ServiceError> {
    let offset = (page - 1).saturating_mul(page_size);
    let result = store.list_history(offset, page_size).await?;

    Ok(HistoryPageResponse {
        entries: result.entries.into_iter().map(Into::into).collect(),
        total_count: result.total,
        page,
        page_count: result.total.div_ceil(page_size),
    })
}
