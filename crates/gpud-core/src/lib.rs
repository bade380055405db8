//! In-process component runtime for the GPUd accelerator-host agent.
//!
//! This crate is transport-agnostic: it owns the component registry,
//! periodic scheduler, custom-plugin lifecycle, and observation store, but
//! knows nothing about HTTP. `gpud-server` wraps a [`Runtime`] behind the
//! HTTP façade; `gpud-client` talks to that façade from the outside.

pub mod check;
pub mod component;
pub mod coordinator;
pub mod error;
pub mod machine_info;
pub mod plugin;
pub mod registry;
pub mod scheduler;
pub mod sethealthy;
pub mod store;
pub mod trigger;

use std::sync::Arc;
use std::time::Duration;

use component::{Event, Metric};
use coordinator::CheckCoordinator;
use machine_info::{MachineInfo, MachineInfoProvider, StdMachineInfoProvider};
use plugin::{PluginSpec, PluginSpecStore};
use registry::ComponentRegistry;
use scheduler::PeriodicScheduler;
use sethealthy::SetHealthyResult;
use store::ObservationStore;
use trigger::TagTriggerResult;

pub use error::{Error, Result};

/// Ties together the registry, scheduler, store, and machine-info provider
/// into the single handle `gpud-server` wires behind its HTTP routes.
///
/// Cloning a `Runtime` is cheap: every field is itself a cheap-clone handle
/// over shared state.
#[derive(Clone)]
pub struct Runtime {
    registry: ComponentRegistry,
    store: ObservationStore,
    coordinator: CheckCoordinator,
    scheduler: Arc<PeriodicScheduler>,
    machine_info: Arc<dyn MachineInfoProvider>,
    plugin_specs: PluginSpecStore,
    request_deadline: Duration,
}

impl Runtime {
    /// Builds a runtime with the default event-ring capacity and the
    /// standard library-backed machine-info provider.
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(Arc::new(StdMachineInfoProvider))
    }

    #[must_use]
    pub fn with_provider(machine_info: Arc<dyn MachineInfoProvider>) -> Self {
        let registry = ComponentRegistry::new();
        let store = ObservationStore::new(store::DEFAULT_EVENT_CAPACITY);
        let coordinator = CheckCoordinator::new();
        let scheduler = Arc::new(PeriodicScheduler::new(
            registry.clone(),
            store.clone(),
            coordinator.clone(),
        ));
        Self {
            registry,
            store,
            coordinator,
            scheduler,
            machine_info,
            plugin_specs: PluginSpecStore::new(),
            request_deadline: trigger::DEFAULT_DEADLINE,
        }
    }

    /// Starts the periodic scheduler for every auto-mode component
    /// currently registered. Call once after any built-in components have
    /// been registered.
    pub async fn start(&self) {
        self.scheduler.start_all().await;
    }

    /// Cancels every scheduler loop and waits for inflight checks to drain.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    #[must_use]
    pub fn machine_info(&self) -> MachineInfo {
        self.machine_info.collect()
    }

    pub async fn trigger(&self, component_name: &str) -> Result<component::HealthState> {
        trigger::trigger(
            &self.registry,
            &self.store,
            &self.coordinator,
            component_name,
            self.request_deadline,
        )
        .await
    }

    pub async fn trigger_by_tag(&self, tag: &str) -> Result<TagTriggerResult> {
        trigger::trigger_by_tag(
            &self.registry,
            &self.store,
            &self.coordinator,
            tag,
            self.request_deadline,
        )
        .await
    }

    pub async fn set_healthy(&self, names: &[String]) -> Result<SetHealthyResult> {
        sethealthy::set_healthy(&self.registry, names).await
    }

    /// Registers a custom plugin and, if it's auto-mode, starts its
    /// scheduler loop immediately (§4.3, §4.5).
    pub async fn register_plugin(
        &self,
        spec: &PluginSpec,
    ) -> Result<Option<component::HealthState>> {
        let init_state = plugin::register(&self.registry, spec).await?;
        let folded_name = component::case_fold(&spec.component_name());
        match &init_state {
            Some(state) => self.store.put_state(&folded_name, state.clone()).await,
            None => {
                self.store
                    .put_state(
                        &folded_name,
                        component::HealthState::initializing(
                            spec.component_name(),
                            "custom-plugin",
                            spec.run_mode,
                        ),
                    )
                    .await;
            }
        }
        self.scheduler.start_component(&spec.component_name()).await;
        self.plugin_specs.put(spec.clone()).await;
        Ok(init_state)
    }

    pub async fn update_plugin(&self, spec: &PluginSpec) -> Result<()> {
        plugin::update(&self.registry, spec).await?;
        self.scheduler.restart_component(&spec.component_name()).await;
        self.plugin_specs.put(spec.clone()).await;
        Ok(())
    }

    /// Returns every tracked custom-plugin spec, ordered by component name
    /// (§4.5 `list`, §6 `/v1/plugins` and `/v1/components/custom-plugin`
    /// GET).
    pub async fn list_plugin_specs(&self) -> Vec<PluginSpec> {
        self.plugin_specs.list().await
    }

    /// Deregisters a component. Stops its scheduler loop, removes it from
    /// the registry, then waits for any inflight check to drain before
    /// discarding its coordinator slot and stored observations (§3
    /// Lifecycle, §4.2 `deregister`).
    pub async fn deregister_component(&self, component_name: &str) -> Result<()> {
        let component = self.registry.get(component_name).await?;
        let canonical_name = component.name.clone();
        let folded = component::case_fold(&canonical_name);
        self.scheduler.stop_component(&folded).await;
        self.registry.deregister(component_name).await?;
        self.coordinator.wait_idle(&canonical_name).await;
        self.coordinator.forget(&canonical_name).await;
        self.store.forget(&folded).await;
        self.plugin_specs.remove(&folded).await;
        Ok(())
    }

    pub async fn put_event(&self, component_name: &str, event: Event) {
        self.store.put_event(component_name, event).await;
    }

    pub async fn put_metric(&self, component_name: &str, metric: Metric) {
        self.store.put_metric(component_name, metric).await;
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginType, Step};
    use crate::component::RunMode;

    fn manual_spec(name: &str) -> PluginSpec {
        PluginSpec {
            plugin_name: name.to_string(),
            plugin_type: PluginType::Component,
            run_mode: RunMode::Manual,
            timeout_seconds: 10,
            interval_seconds: 0,
            tags: vec![],
            steps: vec![Step {
                name: "noop".to_string(),
                script: "true".to_string(),
            }],
            parser: None,
        }
    }

    #[tokio::test]
    async fn register_trigger_deregister_round_trip() {
        let runtime = Runtime::new();
        runtime.register_plugin(&manual_spec("probe1")).await.unwrap();

        let state = runtime.trigger("probe-1").await.unwrap();
        assert_eq!(state.health, crate::component::Health::Healthy);

        runtime.deregister_component("probe-1").await.unwrap();
        assert!(runtime.trigger("probe-1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn init_plugin_state_is_queryable_immediately_after_registration() {
        let runtime = Runtime::new();
        let mut spec = manual_spec("boot-check");
        spec.plugin_type = PluginType::Init;
        runtime.register_plugin(&spec).await.unwrap();

        let states = runtime
            .store()
            .get_states(&["boot-check".to_string()])
            .await
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].health, crate::component::Health::Healthy);
    }

    #[tokio::test]
    async fn manual_plugin_has_a_placeholder_state_before_its_first_trigger() {
        let runtime = Runtime::new();
        runtime.register_plugin(&manual_spec("probe1")).await.unwrap();

        let states = runtime
            .store()
            .get_states(&["probe-1".to_string()])
            .await
            .unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].name, "initializing");

        let triggered = runtime.trigger("probe-1").await.unwrap();
        assert_eq!(triggered.health, crate::component::Health::Healthy);
    }

    #[tokio::test]
    async fn update_plugin_is_case_insensitive_and_atomic() {
        let runtime = Runtime::new();
        runtime.register_plugin(&manual_spec("Probe2")).await.unwrap();
        let mut updated = manual_spec("PROBE2");
        updated.steps[0].script = "echo updated".to_string();
        runtime.update_plugin(&updated).await.unwrap();
        assert_eq!(runtime.registry().list().await.len(), 1);
    }

    #[tokio::test]
    async fn list_plugin_specs_tracks_registration_and_deregistration() {
        let runtime = Runtime::new();
        runtime.register_plugin(&manual_spec("probe1")).await.unwrap();
        assert_eq!(runtime.list_plugin_specs().await.len(), 1);

        runtime.deregister_component("probe-1").await.unwrap();
        assert!(runtime.list_plugin_specs().await.is_empty());
    }

    #[tokio::test]
    async fn machine_info_never_fails() {
        let runtime = Runtime::new();
        let info = runtime.machine_info();
        assert!(!info.os.is_empty());
    }
}
