//! Error taxonomy for the mixer pipeline.
//!
//! # Responsibilities
//! - Classify failures into the small set of outcomes the edge surface knows
//! - Pair every fatal error with a ready client response
//! - Keep degradable failures (missing config, transform errors) out of the
//!   fatal set entirely
//!
//! # Design Decisions
//! - Fatal errors convert to responses via `IntoResponse`; the message
//!   travels in the `x-error` header, the body stays empty
//! - No retries anywhere: an error either surfaces or degrades at its source

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Fatal errors surfaced by the routing/dispatch pipeline.
#[derive(Error, Debug, Clone)]
pub enum MixerError {
    /// Tenant identity could not be derived from the request host.
    #[error("missing {field}")]
    MissingIdentity { field: &'static str },

    /// The config source answered with a non-404 failure.
    #[error("config fetch failed: {status}")]
    ConfigFetchFailed { status: u16 },

    /// The tenant config violated the expected schema.
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    /// The backend fetch itself failed (connect, TLS, protocol).
    #[error("backend unreachable: {message}")]
    BackendUnreachable { message: String },

    /// Anything unexpected; logged and answered with a bare 500.
    #[error("internal server error")]
    Internal { message: String },
}

impl MixerError {
    pub fn missing_identity(field: &'static str) -> Self {
        Self::MissingIdentity { field }
    }

    pub fn config_fetch_failed(status: u16) -> Self {
        Self::ConfigFetchFailed { status }
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn backend_unreachable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnreachable {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The HTTP status this error answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            MixerError::MissingIdentity { .. } => StatusCode::NOT_FOUND,
            MixerError::ConfigFetchFailed { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            MixerError::InvalidConfig { .. } => StatusCode::BAD_REQUEST,
            MixerError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
            MixerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message carried to the client in the `x-error` header.
    pub fn x_error(&self) -> String {
        match self {
            // internal details stay in the logs
            MixerError::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for MixerError {
    fn into_response(self) -> Response {
        if let MixerError::Internal { message } = &self {
            tracing::error!(error = %message, "unexpected failure");
        }
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = self.status();
        let value = HeaderValue::from_str(&self.x_error())
            .unwrap_or_else(|_| HeaderValue::from_static("internal server error"));
        response.headers_mut().insert("x-error", value);
        response
    }
}

/// Result type alias for mixer operations.
pub type MixerResult<T> = Result<T, MixerError>;

impl From<reqwest::Error> for MixerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            MixerError::backend_unreachable(err.to_string())
        } else {
            MixerError::internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            MixerError::missing_identity("site").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MixerError::config_fetch_failed(503).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            MixerError::invalid_config("bad pattern").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MixerError::backend_unreachable("connect refused").status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn x_error_hides_internal_detail() {
        let err = MixerError::internal("secret stack trace");
        assert_eq!(err.x_error(), "internal server error");

        let err = MixerError::missing_identity("org");
        assert_eq!(err.x_error(), "missing org");
    }

    #[test]
    fn into_response_carries_x_error_header() {
        let response = MixerError::missing_identity("site").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("x-error").unwrap(),
            &HeaderValue::from_static("missing site")
        );
    }
}
