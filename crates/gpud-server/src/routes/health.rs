//! Liveness and host-facts routes (§6): `/healthz`, `/machine-info`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::error::ApiResult;
use crate::negotiate::{ok, wants_gzip, Codec};
use crate::AppState;

/// Body shape the client's readiness poll matches on exactly (§4.8
/// `block_until_server_ready`).
#[derive(Serialize)]
struct Healthz {
    status: &'static str,
    version: &'static str,
}

async fn healthz(headers: HeaderMap) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    ok(
        codec,
        wants_gzip(&headers),
        &Healthz {
            status: "ok",
            version: "v1",
        },
    )
}

async fn machine_info(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let info = state.runtime.machine_info();
    ok(codec, wants_gzip(&headers), &info)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/machine-info", get(machine_info))
}
