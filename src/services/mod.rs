/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Paged reads of archived polls.
pub mod history_service;
/// Join, kick and leave handling for the participant registry.
pub mod participant_service;
/// Outbound session events and their payloads.
pub mod poll_events;
/// Poll lifecycle: create, respond, end and expire.
pub mod poll_service;
/// Ordered background writes to the history store.
pub mod persistence;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// History store connection supervisor with backoff.
pub mod storage_supervisor;
/// WebSocket connection and command dispatch.
pub mod websocket_service;
