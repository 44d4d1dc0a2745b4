//! Live Poll Back binary entrypoint wiring REST, WebSocket, SSE, and history storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_poll_back::{
    config::{AppConfig, HistoryBackend},
    dao::history_store::memory::MemoryHistoryStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    start_history_backend(&app_state, HistoryBackend::from_env()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    info!("flushing pending history writes");
    app_state.persistence().flush().await;
    Ok(())
}

/// Install the in-memory store directly, or supervise the MongoDB connection in the background.
async fn start_history_backend(state: &SharedState, backend: HistoryBackend) {
    match backend {
        HistoryBackend::Memory => {
            info!("using in-memory history store");
            state
                .install_history_store(Arc::new(MemoryHistoryStore::new()))
                .await;
        }
        HistoryBackend::Mongo => start_mongo_supervisor(state),
    }
}

#[cfg(feature = "mongo-store")]
fn start_mongo_supervisor(state: &SharedState) {
    use live_poll_back::{
        dao::{
            history_store::{
                HistoryStore,
                mongodb::{MongoConfig, MongoHistoryStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    info!("using MongoDB history store; degraded until connected");
    tokio::spawn(storage_supervisor::run(state.clone(), || async {
        let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
        let store = MongoHistoryStore::connect(config)
            .await
            .map_err(StorageError::from)?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn HistoryStore>)
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo_supervisor(_state: &SharedState) {
    tracing::warn!("built without the mongo-store feature; running in degraded mode");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
