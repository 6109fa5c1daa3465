//! # Tradeflow API
//!
//! REST server for the back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Request Path                                  │
//! │                                                                         │
//! │  HTTP ──► TraceLayer ──► CorsLayer ──► Router                           │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                        Extractors (AuthUser / CartActor / Json)         │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                routes::* handler: validation + rules (tradeflow-core)   │
//! │                                          │                              │
//! │                     ┌────────────────────┴───────────────────┐          │
//! │                     ▼                                        ▼          │
//! │              tradeflow-db repositories             tradeflow-zoho       │
//! │                                                    (OrderSync)          │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                        DTO ──► JSON  /  ApiError ──► JSON + status      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]. Every key can be set through `TRADEFLOW__SECTION__KEY`.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use tradeflow_db::Database;
use tradeflow_zoho::{OrderSync, ZohoClient};

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};

use crate::auth::JwtManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    pub zoho: Arc<ZohoClient>,
}

impl AppState {
    pub fn new(config: ApiConfig, db: Database) -> ApiResult<Self> {
        let zoho = ZohoClient::new(config.zoho.clone(), db.clone())?;
        let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs);
        Ok(AppState {
            db,
            jwt: Arc::new(jwt),
            zoho: Arc::new(zoho),
            config: Arc::new(config),
        })
    }

    pub fn order_sync(&self) -> OrderSync<ZohoClient> {
        OrderSync::new(self.zoho.clone(), self.db.clone())
    }
}

/// Full router with middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    routes::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}
