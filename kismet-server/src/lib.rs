pub mod config;
pub mod health;
pub mod registry;
pub mod signaling;

pub use config::ServerConfig;
pub use registry::{
    Dispatcher, Registry, RegistryCommand, RegistryError, RegistryStats, SearchOutcome,
};
pub use signaling::{ClientSink, SignalingService, ws_handler};

use axum::{Router, routing::get};
use registry::RegistryCommand as Command;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

/// Shared axum state: the outbound sender table plus the command channel
/// into the registry actor. Everything that mutates matchmaking state
/// goes through the channel so mutations stay serialized.
pub struct AppState {
    pub signaling: SignalingService,
    pub registry_tx: mpsc::Sender<Command>,
}

/// Wire up the whole service: spawn the registry actor and build the
/// router around it. Must run inside a tokio runtime.
pub fn app() -> Router {
    let signaling = SignalingService::new();
    let (registry_tx, registry_rx) = mpsc::channel(config::REGISTRY_CHANNEL_CAPACITY);

    let dispatcher = registry::Dispatcher::new(registry_rx, Arc::new(signaling.clone()));
    tokio::spawn(dispatcher.run());

    let state = Arc::new(AppState {
        signaling,
        registry_tx,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health::health_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve a freshly wired app on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener) -> std::io::Result<()> {
    axum::serve(listener, app()).await
}
