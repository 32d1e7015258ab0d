// Shared-secret access gate
//
// Compares the X-API-Key header against the configured credential before a
// protected handler runs. Missing header -> 401, mismatch -> 403. With no
// credential configured the gate is a pass-through. The comparison is
// constant-time; the credential itself is a plain shared string, not a token
// scheme.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::api::AppState;
use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "X-API-Key";

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.api_key() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    match provided {
        None => Err(ApiError::MissingApiKey),
        Some(key) if constant_time_compare(key, expected) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected request with invalid API key");
            Err(ApiError::InvalidApiKey)
        }
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
