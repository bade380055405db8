//! Combined info, health-state, event, and metric query routes (C6, §6):
//! `/v1/info`, `/v1/states`, `/v1/events`, `/v1/metrics`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use gpud_core::component::{case_fold, Capability, Component, HealthState, RunMode};

use super::query::{parse_components, parse_since};
use crate::error::ApiResult;
use crate::negotiate::{ok, wants_gzip, Codec};
use crate::AppState;

/// Component names to serve: the caller's explicit filter, or every
/// currently-registered component when the filter is omitted. Explicit names
/// that aren't registered are left in place so `get_states`/`get_events`
/// fail the whole request with `NotFound` (§4.7 negative cache).
async fn resolve_names(state: &AppState, requested: Vec<String>) -> Vec<String> {
    if requested.is_empty() {
        state
            .runtime
            .registry()
            .list()
            .await
            .iter()
            .map(|c| case_fold(&c.name))
            .collect()
    } else {
        requested
    }
}

fn capability_strs(component: &Component) -> Vec<&'static str> {
    [
        Capability::HealthSettable,
        Capability::Deregisterable,
        Capability::Triggerable,
    ]
    .into_iter()
    .filter(|cap| component.has_capability(*cap))
    .map(|cap| match cap {
        Capability::HealthSettable => "healthSettable",
        Capability::Deregisterable => "deregisterable",
        Capability::Triggerable => "triggerable",
    })
    .collect()
}

/// Combined per-component view: registry metadata plus the latest health
/// state (§6 `/v1/info`).
#[derive(Serialize)]
struct ComponentInfo {
    component_name: String,
    tags: Vec<String>,
    run_mode: RunMode,
    interval_seconds: u64,
    timeout_seconds: u64,
    capabilities: Vec<&'static str>,
    health_state: HealthState,
}

async fn get_info(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names = resolve_names(&state, parse_components(&params)).await;

    let mut infos = Vec::with_capacity(names.len());
    for name in &names {
        // `get` fails the whole request with NotFound for an unknown
        // explicit filter entry (§4.7, §8 "negative cache").
        let component = state.runtime.registry().get(name).await?;
        let mut states = state
            .runtime
            .store()
            .get_states(std::slice::from_ref(name))
            .await?;
        infos.push(ComponentInfo {
            component_name: component.name.clone(),
            tags: component.tags.iter().cloned().collect(),
            run_mode: component.run_mode,
            interval_seconds: component.interval.as_secs(),
            timeout_seconds: component.timeout.as_secs(),
            capabilities: capability_strs(&component),
            health_state: states.remove(0),
        });
    }
    ok(codec, wants_gzip(&headers), &infos)
}

async fn get_states(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names = resolve_names(&state, parse_components(&params)).await;
    let states = state.runtime.store().get_states(&names).await?;
    ok(codec, wants_gzip(&headers), &states)
}

async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names = resolve_names(&state, parse_components(&params)).await;
    let since = parse_since(&params);
    let events = state.runtime.store().get_events(&names, since).await?;
    ok(codec, wants_gzip(&headers), &events)
}

async fn get_metrics(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names = resolve_names(&state, parse_components(&params)).await;
    let since = parse_since(&params);
    // Unlike states/events, an unregistered name yields no rows rather than
    // NotFound (§6: `/v1/metrics` documents no 404).
    let metrics = state.runtime.store().get_metrics(&names, since).await;
    ok(codec, wants_gzip(&headers), &metrics)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/info", get(get_info))
        .route("/v1/states", get(get_states))
        .route("/v1/events", get(get_events))
        .route("/v1/metrics", get(get_metrics))
}
