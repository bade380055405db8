//! HTTP-facing error type: maps `gpud_core`'s sentinel taxonomy (and this
//! crate's own content-negotiation failures) onto status codes per §6/§7.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::negotiate::Codec;

/// Errors the façade itself can raise, plus a thin wrapper around
/// [`gpud_core::Error`] (the sentinel taxonomy, §4.10).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] gpud_core::Error),

    /// `Content-Type` is neither `application/json` nor `application/yaml`
    /// (§6, §9 "Content negotiation": fail fast, before reading the body).
    #[error("unsupported content type")]
    UnsupportedContentType,

    /// A required request body failed to decode under the negotiated codec.
    #[error("failed to decode request body: {0}")]
    BadRequestBody(String),

    /// Gzip-encoded request body had a malformed magic number (§8 boundary
    /// behavior).
    #[error("failed to create gzip reader")]
    BadGzip,

    /// TLS material (self-signed generation or on-disk cert/key) could not be
    /// loaded. Only raised from [`crate::serve`], never from a handler.
    #[error("failed to load TLS material: {0}")]
    Tls(String),

    /// Binding the listener socket failed. Only raised from [`crate::serve`].
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => core_error_status(err),
            ApiError::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadRequestBody(_) | ApiError::BadGzip => StatusCode::BAD_REQUEST,
            ApiError::Tls(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// §7: "map sentinels to HTTP status codes"; §6's Non-OK semantics table.
fn core_error_status(err: &gpud_core::Error) -> StatusCode {
    if err.is_invalid_argument() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_already_exists() {
        StatusCode::CONFLICT
    } else if err.is_failed_precondition() {
        StatusCode::PRECONDITION_FAILED
    } else if err.is_deadline_exceeded() || err.is_canceled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorBody {
    reason: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status >= StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        // Every non-OK response still carries a human-readable reason (§6),
        // encoded plainly as JSON regardless of the request's negotiated
        // codec — a client that couldn't negotiate a codec (415) must still
        // get a parseable error body.
        let body = ErrorBody {
            reason: self.to_string(),
        };
        let bytes = Codec::Json.encode(&body).unwrap_or_default();
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, Codec::Json.content_type())
            .body(Body::from(bytes))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
