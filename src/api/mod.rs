// HTTP surface of the service
//
// One router, one set of handlers. The historical per-deployment variants
// (open vs. keyed, debug vs. hardened errors) are configuration flags, not
// separate code paths: the gate activates when a key is configured and error
// detail follows APP_ENV.

pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::core::config::Config;
use crate::middleware::require_api_key;
use crate::services::FacialAnalyzer;
use crate::utils::Metrics;

/// Upper bound for a single image upload
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analyzer: Arc<dyn FacialAnalyzer>,
    pub metrics: Metrics,
}

/// Build the application router. Every route except the banner sits behind
/// the API key gate; unmatched paths fall through to the 404 catalog without
/// touching the gate.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::list_models))
        .route("/stats", get(handlers::stats))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze-base64", post(handlers::analyze_base64))
        .route("/analyze-multiple", post(handlers::analyze_multiple))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(handlers::home))
        .merge(protected)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
}
