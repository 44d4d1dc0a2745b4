use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether history is being persisted, pinging the store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.history_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "history store health check failed");
            }
        }
        None => warn!("history store unavailable (degraded mode)"),
    }

    HealthResponse::from(state.is_degraded().await)
}
