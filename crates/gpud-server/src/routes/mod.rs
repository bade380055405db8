//! HTTP façade routes (C7, §6). One module per resource group, merged into
//! a single router.

mod components;
mod health;
mod observations;
mod plugins;
mod query;
mod sethealthy;

use axum::Router;

use crate::AppState;

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(components::router())
        .merge(plugins::router())
        .merge(observations::router())
        .merge(sethealthy::router())
        .with_state(state)
}
