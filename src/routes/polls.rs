use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::{
        history::{HistoryPageResponse, HistoryQuery},
        poll::PollSnapshot,
    },
    error::AppError,
    services::{history_service, poll_service},
    state::SharedState,
};

/// Read-only poll endpoints for dashboards and late joiners.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/polls/active", get(get_active_poll))
        .route("/api/polls/history", get(get_history))
}

#[utoipa::path(
    get,
    path = "/api/polls/active",
    tag = "polls",
    responses(
        (status = 200, description = "Snapshot of the active poll", body = PollSnapshot),
        (status = 404, description = "No poll is active")
    )
)]
/// Return the poll currently accepting responses.
pub async fn get_active_poll(
    State(state): State<SharedState>,
) -> Result<Json<PollSnapshot>, AppError> {
    poll_service::active_snapshot(&state)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no active poll".into()))
}

#[utoipa::path(
    get,
    path = "/api/polls/history",
    tag = "polls",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Archived polls, newest first", body = HistoryPageResponse),
        (status = 400, description = "Invalid paging parameters"),
        (status = 503, description = "History store unavailable")
    )
)]
/// Page through archived polls.
pub async fn get_history(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<HistoryQuery>>,
) -> Result<Json<HistoryPageResponse>, AppError> {
    let page = history_service::list_history(&state, &query).await?;
    Ok(Json(page))
}
