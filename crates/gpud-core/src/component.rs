//! Core data model (§3): components, health states, events, and metrics.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Normalizes a component (or plugin) name the way the registry does: case
/// folding plus canonicalization. Used both at registration and at lookup
/// time so `get(name) == get(case_fold(name))` holds (§8 Case-folding).
#[must_use]
pub fn case_fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether a component runs on the periodic scheduler or only on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Driven by the periodic scheduler at `interval`.
    Auto,
    /// Only runs when triggered (§4.4); still registered and trackable.
    Manual,
}

impl RunMode {
    /// String form used in wire payloads and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Auto => "auto",
            RunMode::Manual => "manual",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A behavior a component may optionally support (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Can have its latched-unhealthy state cleared via `set_healthy` (C9).
    HealthSettable,
    /// Can be removed from the registry via `deregister` (C5/C2).
    Deregisterable,
    /// Can be invoked on demand via the trigger protocol (C4).
    Triggerable,
}

/// The set of capabilities a component was registered with. Immutable for
/// the lifetime of a registration (§3 invariant).
pub type Capabilities = HashSet<Capability>;

/// Overall health bucket of a [`HealthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Health {
    /// Parses the lowercase wire form used by plugin parser overrides
    /// (§4.1): `"healthy"`, `"degraded"`, `"unhealthy"`.
    #[must_use]
    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(Health::Healthy),
            "degraded" => Some(Health::Degraded),
            "unhealthy" => Some(Health::Unhealthy),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A component's most recent health evaluation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthState {
    pub component_name: String,
    pub name: String,
    pub health: Health,
    pub reason: String,
    #[serde(default)]
    pub extra_info: HashMap<String, String>,
    /// Acquisition instant, as Unix epoch seconds, for wire-format stability
    /// across JSON/YAML.
    pub time_unix_seconds: i64,
    pub component_type: String,
    pub run_mode: RunMode,
}

impl HealthState {
    /// Placeholder state recorded at registration time, before a component
    /// has ever been checked (§3: "before that, its HS is absent" — resolved
    /// here as a present-but-conservative placeholder rather than a true
    /// absence, so `/v1/states` reports the component instead of 404ing it;
    /// see DESIGN.md for the reasoning). Superseded by the first real check.
    #[must_use]
    pub fn initializing(
        component_name: impl Into<String>,
        component_type: impl Into<String>,
        run_mode: RunMode,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            name: "initializing".to_string(),
            health: Health::Unhealthy,
            reason: "awaiting first check".to_string(),
            extra_info: HashMap::new(),
            time_unix_seconds: now_unix_seconds(),
            component_type: component_type.into(),
            run_mode,
        }
    }

    /// Builds an Unhealthy state carrying `reason`, the shape every timeout
    /// and cancellation path produces (§4.1, §4.3, §5).
    #[must_use]
    pub fn unhealthy(
        component_name: impl Into<String>,
        component_type: impl Into<String>,
        run_mode: RunMode,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            name: "unhealthy".to_string(),
            health: Health::Unhealthy,
            reason: reason.into(),
            extra_info: HashMap::new(),
            time_unix_seconds: now_unix_seconds(),
            component_type: component_type.into(),
            run_mode,
        }
    }
}

pub(crate) fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Info,
    Warn,
    Critical,
}

/// An append-only observation about a component (§3). Stored in a bounded
/// per-component ring by the observation store (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub component_name: String,
    pub time_unix_seconds: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub extra_info: HashMap<String, String>,
}

impl Event {
    #[must_use]
    pub fn new(
        component_name: impl Into<String>,
        event_type: EventType,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            time_unix_seconds: now_unix_seconds(),
            event_type,
            name: name.into(),
            message: message.into(),
            extra_info: HashMap::new(),
        }
    }
}

/// A single point sample (§3). No aggregation happens in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub component_name: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub value: f64,
    pub unix_seconds: i64,
}

impl Metric {
    #[must_use]
    pub fn new(component_name: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            component_name: component_name.into(),
            name: name.into(),
            labels: HashMap::new(),
            value,
            unix_seconds: now_unix_seconds(),
        }
    }
}

/// The probe a component runs to produce a [`HealthState`]. Boxed so both
/// built-in factories and script-backed plugins can implement it uniformly
/// (§9 "Dynamic dispatch on component capabilities").
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Runs exactly once and returns exactly one [`HealthState`]. Must not
    /// raise: any internal failure is folded into the returned state's
    /// health/reason (§4.1).
    async fn probe(&self, ctx: &ProbeContext) -> HealthState;
}

/// What a [`Probe`] is given to run with: which component it belongs to, and
/// a cancellation token tied to the caller's deadline.
pub struct ProbeContext {
    pub component_name: String,
    pub component_type: String,
    pub run_mode: RunMode,
    pub cancel: tokio_util::sync::CancellationToken,
}

/// A registered component (§3). `probe` is intentionally excluded from
/// `Debug`/`Clone` derives (function-pointer-like data); components are
/// always handled behind an `Arc` once registered.
pub struct Component {
    pub name: String,
    pub tags: HashSet<String>,
    pub run_mode: RunMode,
    pub interval: Duration,
    pub timeout: Duration,
    pub capabilities: Capabilities,
    pub component_type: String,
    pub probe: Box<dyn Probe>,
    /// Invoked by the set-healthy protocol (C9) when
    /// `Capability::HealthSettable` is present. `None` otherwise.
    pub set_healthy: Option<Box<dyn Fn() -> Result<(), String> + Send + Sync>>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("run_mode", &self.run_mode)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("capabilities", &self.capabilities)
            .field("component_type", &self.component_type)
            .finish_non_exhaustive()
    }
}

impl Component {
    #[must_use]
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
