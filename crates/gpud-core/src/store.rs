//! Observation store (C6, §4.6): latest health state per component, a
//! bounded per-component event ring, and metric recording delegated to a
//! [`MetricSink`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::component::{Event, Health, HealthState, Metric};
use crate::error::{Error, Result};

/// Default ring capacity per component when a caller doesn't specify one
/// (§4.6: "capacity fixed at build time; default ≥ 1024").
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Where point metrics are recorded. The store owns no aggregation logic of
/// its own; it forwards samples here and keeps its own copy only for the
/// `/v1/metrics` read path.
///
/// Implementations must not block the caller meaningfully — the store holds
/// no lock while calling into the sink.
pub trait MetricSink: Send + Sync {
    fn record(&self, metric: &Metric);
}

/// No-op sink used when no external metrics backend is wired up.
#[derive(Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record(&self, _metric: &Metric) {}
}

/// Counts health-state transitions by bucket, exported in Prometheus text
/// exposition format.
#[derive(Default)]
pub struct HealthCounterSink {
    healthy: std::sync::atomic::AtomicU64,
    degraded: std::sync::atomic::AtomicU64,
    unhealthy: std::sync::atomic::AtomicU64,
}

impl HealthCounterSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, health: Health) {
        use std::sync::atomic::Ordering::Relaxed;
        match health {
            Health::Healthy => self.healthy.fetch_add(1, Relaxed),
            Health::Degraded => self.degraded.fetch_add(1, Relaxed),
            Health::Unhealthy => self.unhealthy.fetch_add(1, Relaxed),
        };
    }

    #[must_use]
    pub fn export_prometheus(&self) -> String {
        use std::sync::atomic::Ordering::Relaxed;
        format!(
            "# HELP gpud_health_state_total Count of health state observations by bucket.\n\
             # TYPE gpud_health_state_total counter\n\
             gpud_health_state_total{{health=\"healthy\"}} {}\n\
             gpud_health_state_total{{health=\"degraded\"}} {}\n\
             gpud_health_state_total{{health=\"unhealthy\"}} {}\n",
            self.healthy.load(Relaxed),
            self.degraded.load(Relaxed),
            self.unhealthy.load(Relaxed),
        )
    }
}

impl MetricSink for HealthCounterSink {
    fn record(&self, _metric: &Metric) {}
}

struct PerComponent {
    state: Option<HealthState>,
    events: VecDeque<Event>,
    metrics: Vec<Metric>,
}

impl PerComponent {
    fn new() -> Self {
        Self {
            state: None,
            events: VecDeque::new(),
            metrics: Vec::new(),
        }
    }
}

/// Shared, cloneable handle; clones observe the same underlying data.
#[derive(Clone)]
pub struct ObservationStore {
    inner: Arc<RwLock<HashMap<String, PerComponent>>>,
    event_capacity: usize,
    health_counters: Arc<HealthCounterSink>,
    sink: Arc<dyn MetricSink>,
}

impl ObservationStore {
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            event_capacity,
            health_counters: Arc::new(HealthCounterSink::new()),
            sink: Arc::new(NullMetricSink),
        }
    }

    #[must_use]
    pub fn with_sink(event_capacity: usize, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            event_capacity,
            health_counters: Arc::new(HealthCounterSink::new()),
            sink,
        }
    }

    #[must_use]
    pub fn health_counters(&self) -> &HealthCounterSink {
        &self.health_counters
    }

    /// Overwrites the latest HS for `component_name` and bumps the
    /// health-state metric surface.
    pub async fn put_state(&self, component_name: &str, state: HealthState) {
        self.health_counters.observe(state.health);
        let mut inner = self.inner.write().await;
        inner
            .entry(component_name.to_string())
            .or_insert_with(PerComponent::new)
            .state = Some(state);
    }

    /// Appends an event, dropping the oldest if the per-component ring is
    /// full (§4.6, §5 Backpressure).
    pub async fn put_event(&self, component_name: &str, event: Event) {
        let mut inner = self.inner.write().await;
        let entry = inner
            .entry(component_name.to_string())
            .or_insert_with(PerComponent::new);
        if entry.events.len() >= self.event_capacity {
            entry.events.pop_front();
        }
        entry.events.push_back(event);
    }

    /// Records a point sample, both in the store's own read path and in the
    /// configured [`MetricSink`].
    pub async fn put_metric(&self, component_name: &str, metric: Metric) {
        self.sink.record(&metric);
        let mut inner = self.inner.write().await;
        inner
            .entry(component_name.to_string())
            .or_insert_with(PerComponent::new)
            .metrics
            .push(metric);
    }

    /// Returns the latest HS for each name in `components`, in the order the
    /// names were given. Fails the *whole* call with [`Error::NotFound`] if
    /// any name has never had a state recorded (§4.6, negative cache §8).
    pub async fn get_states(&self, components: &[String]) -> Result<Vec<HealthState>> {
        let inner = self.inner.read().await;
        let mut out = Vec::with_capacity(components.len());
        for name in components {
            let state = inner
                .get(name)
                .and_then(|c| c.state.clone())
                .ok_or_else(|| Error::NotFound(format!("component '{name}' is not registered")))?;
            out.push(state);
        }
        Ok(out)
    }

    /// Returns events per `components` with `time_unix_seconds >= since`,
    /// ordered by component then time ascending.
    pub async fn get_events(&self, components: &[String], since: i64) -> Result<Vec<Event>> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for name in components {
            let entry = inner
                .get(name)
                .ok_or_else(|| Error::NotFound(format!("component '{name}' is not registered")))?;
            out.extend(
                entry
                    .events
                    .iter()
                    .filter(|e| e.time_unix_seconds >= since)
                    .cloned(),
            );
        }
        Ok(out)
    }

    /// Returns metrics per `components` with `unix_seconds >= since`. Unlike
    /// `get_states`/`get_events`, an unregistered component yields no rows
    /// rather than NotFound (§6: `/v1/metrics` has no documented 404).
    pub async fn get_metrics(&self, components: &[String], since: i64) -> Vec<Metric> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for name in components {
            if let Some(entry) = inner.get(name) {
                out.extend(entry.metrics.iter().filter(|m| m.unix_seconds >= since).cloned());
            }
        }
        out
    }

    /// Drops all stored state for a component, called on deregistration.
    pub async fn forget(&self, component_name: &str) {
        self.inner.write().await.remove(component_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::RunMode;

    fn hs(name: &str, health: Health, t: i64) -> HealthState {
        HealthState {
            component_name: name.to_string(),
            name: "state".to_string(),
            health,
            reason: "ok".to_string(),
            extra_info: Default::default(),
            time_unix_seconds: t,
            component_type: name.to_string(),
            run_mode: RunMode::Auto,
        }
    }

    #[tokio::test]
    async fn put_then_get_states_returns_latest() {
        let store = ObservationStore::new(4);
        store.put_state("disk", hs("disk", Health::Healthy, 1)).await;
        store.put_state("disk", hs("disk", Health::Degraded, 2)).await;
        let states = store.get_states(&["disk".to_string()]).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].health, Health::Degraded);
    }

    #[tokio::test]
    async fn get_states_unknown_component_is_not_found() {
        let store = ObservationStore::new(4);
        let err = store.get_states(&["ghost".to_string()]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn event_ring_drops_oldest_when_full() {
        let store = ObservationStore::new(2);
        for i in 0..5 {
            store
                .put_event(
                    "gpu",
                    Event::new("gpu", crate::component::EventType::Info, "tick", format!("{i}")),
                )
                .await;
        }
        let events = store.get_events(&["gpu".to_string()], 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "3");
        assert_eq!(events[1].message, "4");
    }

    #[tokio::test]
    async fn metrics_since_filter() {
        let store = ObservationStore::new(4);
        store.put_metric("gpu", Metric { component_name: "gpu".into(), name: "temp".into(), labels: Default::default(), value: 1.0, unix_seconds: 10 }).await;
        store.put_metric("gpu", Metric { component_name: "gpu".into(), name: "temp".into(), labels: Default::default(), value: 2.0, unix_seconds: 20 }).await;
        let recent = store.get_metrics(&["gpu".to_string()], 15).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].value, 2.0);
    }
}
