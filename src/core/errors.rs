// Error taxonomy for the service
//
// Three layers, converted at the boundaries:
// - ConfigError: startup validation, aborts the process
// - AnalysisError: inference engine failures
// - ApiError: everything a handler can answer with, carries its HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("IoU threshold must be in [0.0, 1.0], got {0}")]
    InvalidIoUThreshold(f32),

    #[error("Minimum face size must be > 0")]
    InvalidMinFaceSize,

    #[error("Session pool size must be > 0")]
    InvalidPoolSize,

    #[error("Unknown default detector '{0}'")]
    UnknownDetector(String),
}

/// Inference engine errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("ONNX inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),
}

/// Request-level errors with their HTTP status mapping
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("API Key não fornecida")]
    MissingApiKey,

    #[error("API Key inválida")]
    InvalidApiKey,

    #[error("{0}")]
    Decode(String),

    #[error("{public}")]
    Internal {
        public: String,
        detail: String,
        type_name: String,
        expose: bool,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Wrap an engine or runtime failure. `expose` mirrors APP_ENV=development:
    /// the source detail goes into the response body instead of only the log.
    pub fn internal<E: std::fmt::Display>(public: &str, source: &E, expose: bool) -> Self {
        Self::Internal {
            public: public.to_string(),
            detail: source.to_string(),
            type_name: short_type_name::<E>().to_string(),
            expose,
        }
    }
}

/// Localized error body shared by every failure response
#[derive(Debug, Serialize)]
struct ErrorBody {
    sucesso: bool,
    erro: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mensagem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_erro: Option<String>,
}

impl ErrorBody {
    fn new(erro: impl Into<String>) -> Self {
        Self {
            sucesso: false,
            erro: erro.into(),
            mensagem: None,
            tipo_erro: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, ErrorBody::new(message)),
            ApiError::Decode(message) => (StatusCode::BAD_REQUEST, ErrorBody::new(message)),
            ApiError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    mensagem: Some("Envie o header X-API-Key na requisição".to_string()),
                    ..ErrorBody::new("API Key não fornecida")
                },
            ),
            ApiError::InvalidApiKey => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    mensagem: Some("A chave de API fornecida não é válida".to_string()),
                    ..ErrorBody::new("API Key inválida")
                },
            ),
            ApiError::Internal {
                public,
                detail,
                type_name,
                expose,
            } => {
                error!("{}: [{}] {}", public, type_name, detail);
                let body = if expose {
                    ErrorBody {
                        tipo_erro: Some(type_name),
                        ..ErrorBody::new(detail)
                    }
                } else {
                    ErrorBody::new(public)
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

// Convenience type aliases for Results
pub type AnalysisResult<T> = Result<T, AnalysisError>;
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::validation("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MissingApiKey.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::InvalidApiKey.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::decode("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::internal("x", &std::fmt::Error, false)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_short_type_name_strips_path() {
        assert_eq!(short_type_name::<std::fmt::Error>(), "Error");
    }
}
