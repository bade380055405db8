//! Custom-plugin lifecycle routes (C5, §6): `/v1/components/custom-plugin`
//! (list/register/update) and `/v1/plugins` (list).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use gpud_core::component::HealthState;
use gpud_core::plugin::PluginSpec;

use crate::error::ApiResult;
use crate::negotiate::{ok, wants_gzip, Codec};
use crate::AppState;

/// The server's normalized view of a registered plugin: the stored
/// [`PluginSpec`] plus its derived component name (§4.5 `list`).
#[derive(Serialize)]
struct PluginView {
    component_name: String,
    #[serde(flatten)]
    spec: PluginSpec,
}

fn to_views(specs: Vec<PluginSpec>) -> Vec<PluginView> {
    specs
        .into_iter()
        .map(|spec| PluginView {
            component_name: spec.component_name(),
            spec,
        })
        .collect()
}

async fn list_plugins(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let specs = state.runtime.list_plugin_specs().await;
    ok(codec, wants_gzip(&headers), &to_views(specs))
}

#[derive(Serialize)]
struct RegisterResponse {
    component_name: String,
    plugin: PluginSpec,
    initial_state: Option<HealthState>,
}

async fn register_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let spec: PluginSpec = codec.decode(&body)?;
    let initial_state = state.runtime.register_plugin(&spec).await?;
    let response = RegisterResponse {
        component_name: spec.component_name(),
        plugin: spec,
        initial_state,
    };
    ok(codec, wants_gzip(&headers), &response)
}

#[derive(Serialize)]
struct UpdateResponse {
    component_name: String,
    plugin: PluginSpec,
}

async fn update_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let spec: PluginSpec = codec.decode(&body)?;
    state.runtime.update_plugin(&spec).await?;
    let response = UpdateResponse {
        component_name: spec.component_name(),
        plugin: spec,
    };
    ok(codec, wants_gzip(&headers), &response)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/components/custom-plugin",
            get(list_plugins).post(register_plugin).put(update_plugin),
        )
        .route("/v1/plugins", get(list_plugins))
}
