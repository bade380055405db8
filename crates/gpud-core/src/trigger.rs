//! Trigger protocol (C4, §4.4): run a component's check synchronously on
//! demand, coalescing onto an already-inflight probe rather than starting a
//! second one.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::component::{case_fold, HealthState};
use crate::coordinator::CheckCoordinator;
use crate::error::{Error, Result};
use crate::registry::ComponentRegistry;
use crate::store::ObservationStore;

/// Default caller deadline applied when none is supplied (matches the
/// façade's `request_deadline`, §4.7).
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Outcome of [`trigger_by_tag`] (§6 `/v1/components/trigger-tag`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TagTriggerResult {
    pub components: Vec<String>,
    pub success: bool,
}

/// Runs a single component's check synchronously and records the result.
/// Fails with [`Error::InvalidArgument`] for an empty name, or
/// [`Error::NotFound`] if the component isn't registered.
pub async fn trigger(
    registry: &ComponentRegistry,
    store: &ObservationStore,
    coordinator: &CheckCoordinator,
    component_name: &str,
    deadline: Duration,
) -> Result<HealthState> {
    if component_name.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "component name must not be empty".to_string(),
        ));
    }
    let component = registry.get(component_name).await?;
    let cancel = CancellationToken::new();
    let state = coordinator
        .run_or_coalesce(&component, &cancel, deadline)
        .await?;
    store.put_state(&case_fold(&component.name), state.clone()).await;
    Ok(state)
}

/// Runs every component carrying `tag` synchronously (§4.4). `success` is
/// true only if every invoked component reports Healthy. Fails with
/// [`Error::InvalidArgument`] for an empty tag (§8 boundary behavior).
pub async fn trigger_by_tag(
    registry: &ComponentRegistry,
    store: &ObservationStore,
    coordinator: &CheckCoordinator,
    tag: &str,
    deadline: Duration,
) -> Result<TagTriggerResult> {
    if tag.trim().is_empty() {
        return Err(Error::InvalidArgument("tag must not be empty".to_string()));
    }
    let components = registry.list_by_tag(tag).await;
    let mut names = Vec::with_capacity(components.len());
    let mut success = true;

    for component in &components {
        let cancel = CancellationToken::new();
        let state = coordinator
            .run_or_coalesce(component, &cancel, deadline)
            .await?;
        if state.health != crate::component::Health::Healthy {
            success = false;
        }
        store
            .put_state(&case_fold(&component.name), state)
            .await;
        names.push(component.name.clone());
    }

    Ok(TagTriggerResult {
        components: names,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Capability, Health, Probe, ProbeContext, RunMode};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedProbe {
        health: Health,
    }

    #[async_trait]
    impl Probe for FixedProbe {
        async fn probe(&self, ctx: &ProbeContext) -> HealthState {
            HealthState {
                component_name: ctx.component_name.clone(),
                name: "state".to_string(),
                health: self.health,
                reason: "fixed".to_string(),
                extra_info: Default::default(),
                time_unix_seconds: 0,
                component_type: ctx.component_type.clone(),
                run_mode: ctx.run_mode,
            }
        }
    }

    fn make(name: &str, tag: &str, health: Health) -> crate::component::Component {
        crate::component::Component {
            name: name.to_string(),
            tags: [tag.to_string()].into_iter().collect(),
            run_mode: RunMode::Manual,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            capabilities: [Capability::Triggerable].into_iter().collect(),
            component_type: name.to_string(),
            probe: Box::new(FixedProbe { health }),
            set_healthy: None,
        }
    }

    #[tokio::test]
    async fn trigger_empty_name_is_invalid_argument() {
        let registry = ComponentRegistry::new();
        let store = ObservationStore::new(16);
        let coordinator = CheckCoordinator::new();
        let err = trigger(&registry, &store, &coordinator, "  ", DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn trigger_unknown_component_is_not_found() {
        let registry = ComponentRegistry::new();
        let store = ObservationStore::new(16);
        let coordinator = CheckCoordinator::new();
        let err = trigger(&registry, &store, &coordinator, "ghost", DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn trigger_by_tag_success_requires_all_healthy() {
        let registry = ComponentRegistry::new();
        registry.register(make("a", "gpu-fleet", Health::Healthy)).await.unwrap();
        registry.register(make("b", "gpu-fleet", Health::Degraded)).await.unwrap();
        let store = ObservationStore::new(16);
        let coordinator = CheckCoordinator::new();

        let result = trigger_by_tag(&registry, &store, &coordinator, "gpu-fleet", DEFAULT_DEADLINE)
            .await
            .unwrap();
        assert_eq!(result.components.len(), 2);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn trigger_by_tag_empty_tag_is_invalid_argument() {
        let registry = ComponentRegistry::new();
        let store = ObservationStore::new(16);
        let coordinator = CheckCoordinator::new();
        let err = trigger_by_tag(&registry, &store, &coordinator, "", DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
