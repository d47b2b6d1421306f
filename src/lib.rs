pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{orders::OrderIntentService, payments::PaymentGateway},
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Option<Arc<EventSender>>,
    pub orders: Arc<OrderIntentService>,
    /// `None` when no gateway credentials are configured; checkout
    /// endpoints report a configuration error at request time rather
    /// than refusing to boot.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let orders = Arc::new(OrderIntentService::new(db.clone(), event_sender.clone()));
        Self {
            db,
            config,
            event_sender,
            orders,
            gateway,
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(Extension(config): Extension<Arc<AppConfig>>) -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config.environment,
    }))
}

/// CORS policy from configuration. Permissive in development; in
/// production only the configured origins are allowed.
pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| {
            let origin = origin.trim();
            if origin.is_empty() {
                return None;
            }
            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);
    if config.cors_allow_credentials {
        layer = layer.allow_credentials(true);
    }
    layer
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/payments", handlers::payments::payments_routes())
}

/// Assembles the full application router: versioned API, auth,
/// documentation, and operational endpoints, with tracing, CORS, and
/// compression applied across the board.
pub fn app_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    let cors = build_cors_layer(&state.config);
    let config = state.config.clone();

    Router::new()
        .merge(openapi::swagger_ui())
        .route("/health", get(health_check))
        .route("/status", get(status))
        .nest(
            "/api/v1/auth",
            auth::auth_routes().with_state(auth_service.clone()),
        )
        .nest("/api/v1", api_v1_routes().with_state(state))
        .layer(Extension(auth_service))
        .layer(Extension(config))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
