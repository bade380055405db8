//! Content negotiation (§4.7, §6): JSON by default, YAML when
//! `Content-Type: application/yaml`, gzip-encoded when the caller sends
//! `Accept-Encoding: gzip`. Shared by every route so the façade's wire
//! behavior is uniform rather than re-implemented per handler.

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;

use crate::error::ApiError;

/// The two wire formats the façade understands (§6 "Wire formats").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Yaml,
}

impl Codec {
    /// Picks a codec from a request's `Content-Type` header. Defaults to
    /// JSON when the header is absent (§6). Fails fast with
    /// [`ApiError::UnsupportedContentType`] for anything else, *before* the
    /// body is read (§9).
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        match headers.get(header::CONTENT_TYPE) {
            None => Ok(Codec::Json),
            Some(value) => Self::from_content_type_str(value.to_str().unwrap_or_default()),
        }
    }

    fn from_content_type_str(value: &str) -> Result<Self, ApiError> {
        // Strip a `; charset=...` suffix the way a real client might send.
        let mime = value.split(';').next().unwrap_or_default().trim();
        match mime {
            "" | "application/json" => Ok(Codec::Json),
            "application/yaml" | "text/yaml" => Ok(Codec::Yaml),
            _ => Err(ApiError::UnsupportedContentType),
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Codec::Json => "application/json",
            Codec::Yaml => "application/yaml",
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, ApiError> {
        match self {
            Codec::Json => serde_json::to_vec(value)
                .map_err(|e| ApiError::BadRequestBody(format!("failed to encode json: {e}"))),
            Codec::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| ApiError::BadRequestBody(format!("failed to encode yaml: {e}"))),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, ApiError> {
        match self {
            Codec::Json => serde_json::from_slice(bytes)
                .map_err(|e| ApiError::BadRequestBody(format!("failed to decode json: {e}"))),
            Codec::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| ApiError::BadRequestBody(format!("failed to unmarshal yaml: {e}"))),
        }
    }
}

/// `true` if the request asked for a gzip response via `Accept-Encoding`
/// (§4.7, §6). Matches loosely (substring) the way real `Accept-Encoding`
/// headers list multiple encodings (`gzip, deflate, br`).
#[must_use]
pub fn wants_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writing to an in-memory `Vec` never fails.
    encoder.write_all(bytes).expect("in-memory gzip write");
    encoder.finish().expect("in-memory gzip finish")
}

/// Builds the final response for a successful request: serializes `value`
/// under `codec`, gzip-encodes it if `gzip` was requested, and sets
/// `Content-Type`/`Content-Encoding` accordingly.
pub fn respond<T: Serialize>(
    codec: Codec,
    gzip_requested: bool,
    status: StatusCode,
    value: &T,
) -> Result<Response, ApiError> {
    let body = codec.encode(value)?;
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, codec.content_type());
    let body = if gzip_requested {
        builder = builder.header(header::CONTENT_ENCODING, "gzip");
        gzip(&body)
    } else {
        body
    };
    builder
        .body(Body::from(body))
        .map_err(|e| ApiError::BadRequestBody(e.to_string()))
}

/// Convenience for handlers that always answer 200 OK.
pub fn ok<T: Serialize>(codec: Codec, gzip_requested: bool, value: &T) -> Result<Response, ApiError> {
    respond(codec, gzip_requested, StatusCode::OK, value)
}
