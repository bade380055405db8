//! Component listing, deregistration, and the trigger protocol (C4, §6):
//! `/v1/components`, `/v1/components/trigger-check`, `/v1/components/trigger-tag`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use gpud_core::Error;

use crate::error::ApiResult;
use crate::negotiate::{ok, wants_gzip, Codec};
use crate::AppState;

async fn list_components(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names: Vec<String> = state
        .runtime
        .registry()
        .list()
        .await
        .iter()
        .map(|c| c.name.clone())
        .collect();
    ok(codec, wants_gzip(&headers), &names)
}

#[derive(Serialize)]
struct DeregisterResponse {
    deregistered: String,
}

async fn deregister_component(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let name = params.get("componentName").cloned().unwrap_or_default();
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument("componentName parameter is required".to_string()).into());
    }
    state.runtime.deregister_component(&name).await?;
    ok(
        codec,
        wants_gzip(&headers),
        &DeregisterResponse { deregistered: name },
    )
}

async fn trigger_check(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let name = params.get("componentName").cloned().unwrap_or_default();
    let state_result = state.runtime.trigger(&name).await?;
    ok(codec, wants_gzip(&headers), &state_result)
}

/// Wire shape of the group trigger, including the `exit` convenience field
/// the upstream agent's CLI uses as a process exit code (0 on success, 1
/// otherwise) alongside the structured `success`/`components` fields (§6
/// `/v1/components/trigger-tag`).
#[derive(Serialize)]
struct TriggerTagResponse {
    components: Vec<String>,
    success: bool,
    exit: i32,
}

async fn trigger_tag(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let tag = params.get("tagName").cloned().unwrap_or_default();
    let result = state.runtime.trigger_by_tag(&tag).await?;
    let body = TriggerTagResponse {
        exit: i32::from(!result.success),
        components: result.components,
        success: result.success,
    };
    ok(codec, wants_gzip(&headers), &body)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/components",
            get(list_components).delete(deregister_component),
        )
        .route("/v1/components/trigger-check", get(trigger_check))
        .route("/v1/components/trigger-tag", get(trigger_tag))
}
