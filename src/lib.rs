pub mod appresult;
pub mod config;
pub mod gateway;
pub mod health;
pub mod relay;
pub mod rooms;

use std::sync::Arc;

use axum::{extract::FromRef, http::Method, routing::get, Router};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub use appresult::{AppError, AppResult};
use config::Config;
use gateway::{ConnectionGateway, SharedRegistry};
use relay::SignalRelay;
use rooms::registry::RoomRegistry;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub gateway: Arc<ConnectionGateway>,
    pub relay: SignalRelay,
}

impl AppState {
    /// Fresh, empty state. Nothing is shared between two calls.
    pub fn new(config: &Config) -> Self {
        let registry = Arc::new(Mutex::new(RoomRegistry::new(config.room_id_length)));
        let gateway = Arc::new(ConnectionGateway::new(registry.clone()));
        Self {
            registry,
            relay: SignalRelay::new(gateway.clone()),
            gateway,
        }
    }
}

pub fn router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(health::health))
        .merge(rooms::router());

    if let Some(dir) = &config.static_dir {
        // unknown paths fall through to the client's index.html
        app = app.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        );
    }

    app.with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
