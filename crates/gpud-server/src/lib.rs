//! HTTP façade (C7) for the GPUd component runtime: content-negotiated
//! JSON/YAML routes, gzip encoding, and the negative-cache contract over
//! `gpud-core`'s [`gpud_core::Runtime`].
//!
//! This crate knows nothing about how components are implemented; it only
//! multiplexes HTTP requests onto a [`Runtime`] handle. `gpud-client` is its
//! symmetric peer.

pub mod config;
pub mod error;
pub mod negotiate;
mod routes;

use std::time::Duration;

use axum::Router;
use gpud_core::Runtime;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use config::{ServerConfig, TlsMaterial};
pub use error::{ApiError, ApiResult};

/// State shared across every handler: a cheap-clone handle to the runtime.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Runtime,
}

/// Builds the façade's router over `runtime`, with a per-request timeout
/// enforcing the never-block property (§4.7, §5) and request tracing.
#[must_use]
pub fn router(runtime: Runtime, request_deadline: Duration) -> Router {
    let state = AppState { runtime };
    routes::build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(tower::timeout::TimeoutLayer::new(request_deadline)),
    )
}

/// Loads TLS material per [`TlsMaterial`], binds `config.bind_addr()`, and
/// serves the façade until the process is terminated. Self-signed material
/// is generated fresh on every call — fine for the agent's own lifetime, not
/// meant to be persisted across restarts (§6 "TLS; self-signed accepted by
/// the standard client").
pub async fn serve(runtime: Runtime, config: ServerConfig) -> Result<(), ApiError> {
    let tls = load_tls(config.tls()).await?;
    let app = router(runtime, config.request_deadline());

    tracing::info!(addr = %config.bind_addr(), "gpud HTTP façade listening");
    axum_server::bind_rustls(config.bind_addr(), tls)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn load_tls(material: &TlsMaterial) -> Result<axum_server::tls_rustls::RustlsConfig, ApiError> {
    match material {
        TlsMaterial::Files { cert_path, key_path } => {
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(ApiError::Io)
        }
        TlsMaterial::SelfSigned { subject_alt_names } => {
            let rcgen::CertifiedKey { cert, key_pair } =
                rcgen::generate_simple_self_signed(subject_alt_names.clone())
                    .map_err(|e| ApiError::Tls(e.to_string()))?;
            axum_server::tls_rustls::RustlsConfig::from_pem(
                cert.pem().into_bytes(),
                key_pair.serialize_pem().into_bytes(),
            )
            .await
            .map_err(ApiError::Io)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_returns_ok_status_body() {
        let app = router(Runtime::new(), Duration::from_secs(5));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], "v1");
    }

    #[tokio::test]
    async fn unknown_component_filter_is_404() {
        let app = router(Runtime::new(), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/states?components=doesnotexist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn set_healthy_without_components_is_400() {
        let app = router(Runtime::new(), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/health-states/set-healthy")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_415() {
        let app = router(Runtime::new(), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/components/custom-plugin")
                    .header("content-type", "text/plain")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
