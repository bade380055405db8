//! Response shapes that have no one-to-one `gpud_core` type (the façade
//! composes them from several sources). Plain DTOs reusing `gpud_core`'s
//! own types wherever a route's body is just one of those verbatim.

use serde::Deserialize;

use gpud_core::component::{HealthState, RunMode};

/// `/v1/info`'s per-component view (registry metadata plus latest state).
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentInfo {
    pub component_name: String,
    pub tags: Vec<String>,
    pub run_mode: RunMode,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub capabilities: Vec<String>,
    pub health_state: HealthState,
}

/// `/v1/components` DELETE response.
#[derive(Debug, Clone, Deserialize)]
pub struct Deregistered {
    pub deregistered: String,
}

/// `/v1/components/custom-plugin` POST response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOutcome {
    pub component_name: String,
    pub plugin: gpud_core::plugin::PluginSpec,
    pub initial_state: Option<HealthState>,
}

/// `/v1/components/custom-plugin` PUT response.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOutcome {
    pub component_name: String,
    pub plugin: gpud_core::plugin::PluginSpec,
}

/// `/healthz` body, checked verbatim by [`crate::Client::block_until_ready`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Healthz {
    pub status: String,
    pub version: String,
}
