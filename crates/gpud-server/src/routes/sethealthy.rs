//! Set-healthy protocol route (C9, §6): `/v1/health-states/set-healthy`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Router;

use super::query::parse_components;
use crate::error::ApiResult;
use crate::negotiate::{ok, wants_gzip, Codec};
use crate::AppState;

async fn set_healthy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let codec = Codec::from_headers(&headers)?;
    let names = parse_components(&params);
    let result = state.runtime.set_healthy(&names).await?;
    ok(codec, wants_gzip(&headers), &result)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/v1/health-states/set-healthy", post(set_healthy))
}
