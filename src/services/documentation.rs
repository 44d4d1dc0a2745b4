use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Poll Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::polls::get_active_poll,
        crate::routes::polls::get_history,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::sse::Handshake,
            crate::dto::ws::InboundCommand,
            crate::dto::ws::CreatePollCommand,
            crate::dto::ws::RosterChangedEvent,
            crate::dto::ws::SessionJoinedEvent,
            crate::dto::ws::ResponseAcceptedEvent,
            crate::dto::ws::RemovedFromSessionEvent,
            crate::dto::ws::CommandRejectedEvent,
            crate::dto::poll::PollSnapshot,
            crate::dto::poll::ResponseSummary,
            crate::dto::poll::PollEndedEvent,
            crate::dto::history::HistoryPageResponse,
            crate::dto::history::HistoryEntry,
            crate::dto::history::HistoryResponse,
            crate::error::ErrorCategory,
            crate::state::poll::EndReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "session", description = "WebSocket session for presenters and participants"),
        (name = "polls", description = "Active poll and archived history"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/sse/public",
            "/ws",
            "/api/polls/active",
            "/api/polls/history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
