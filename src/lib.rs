pub mod appresult;
pub mod config;
pub mod connections;
pub mod error;
pub mod events;
pub mod files;
pub mod hub;
pub mod protocol;
pub mod rooms;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method},
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use appresult::{AppError, AppResult};
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult};
pub use hub::Hub;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<ChatConfig>,
}

impl AppState {
    pub async fn new(config: ChatConfig) -> anyhow::Result<Self> {
        let hub = Hub::new(&config).await.with_context(|| {
            format!("failed to open upload directory {}", config.upload_dir.display())
        })?;
        Ok(Self {
            hub: Arc::new(hub),
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    Ok(Router::new()
        .route("/health", get(health))
        .route("/ws", get(rooms::ws::room_ws))
        .merge(files::router())
        .layer(cors)
        .with_state(state))
}

fn cors_layer(config: &ChatConfig) -> anyhow::Result<CorsLayer> {
    let origin = match &config.cors_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS_ORIGIN {origin:?}"))?,
        ),
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST]))
}

async fn health() -> &'static str {
    "OK"
}
