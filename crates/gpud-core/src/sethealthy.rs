//! Set-healthy protocol (C9, §4.9): operator acknowledgement that clears a
//! latched unhealthy state on a capable component.

use std::collections::HashMap;

use tracing::debug;

use crate::component::Capability;
use crate::error::{Error, Result};
use crate::registry::ComponentRegistry;

/// Result of [`set_healthy`] (§6 `/v1/health-states/set-healthy`).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SetHealthyResult {
    pub successful: Vec<String>,
    pub failed: HashMap<String, String>,
}

/// Invokes each capable component's set-healthy hook. Components that lack
/// [`Capability::HealthSettable`] are silently dropped with a debug log —
/// they appear in neither `successful` nor `failed` (§4.9).
///
/// Fails the whole call with [`Error::InvalidArgument`] if `names` is empty
/// (§6: "components parameter is required").
pub async fn set_healthy(registry: &ComponentRegistry, names: &[String]) -> Result<SetHealthyResult> {
    if names.is_empty() {
        return Err(Error::InvalidArgument(
            "components parameter is required".to_string(),
        ));
    }

    let mut result = SetHealthyResult::default();
    for name in names {
        let component = match registry.get(name).await {
            Ok(c) => c,
            Err(_) => {
                result.failed.insert(name.clone(), "not found".to_string());
                continue;
            }
        };
        if !component.has_capability(Capability::HealthSettable) {
            debug!(component = %name, "set-healthy skipped: component is not health-settable");
            continue;
        }
        let Some(hook) = component.set_healthy.as_ref() else {
            debug!(component = %name, "set-healthy skipped: no hook despite capability flag");
            continue;
        };
        match hook() {
            Ok(()) => result.successful.push(component.name.clone()),
            Err(reason) => {
                result.failed.insert(component.name.clone(), reason);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Health, HealthState, Probe, ProbeContext, RunMode};
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoopProbe;

    #[async_trait]
    impl Probe for NoopProbe {
        async fn probe(&self, ctx: &ProbeContext) -> HealthState {
            HealthState::unhealthy(&ctx.component_name, &ctx.component_type, ctx.run_mode, "noop")
        }
    }

    fn make(name: &str, settable: bool, ok: bool) -> Component {
        Component {
            name: name.to_string(),
            tags: Default::default(),
            run_mode: RunMode::Manual,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            capabilities: if settable {
                [Capability::HealthSettable].into_iter().collect()
            } else {
                Default::default()
            },
            component_type: name.to_string(),
            probe: Box::new(NoopProbe),
            set_healthy: if settable {
                Some(Box::new(move || {
                    if ok {
                        Ok(())
                    } else {
                        Err("hardware still reporting a fault".to_string())
                    }
                }))
            } else {
                None
            },
        }
    }

    #[tokio::test]
    async fn empty_names_is_invalid_argument() {
        let registry = ComponentRegistry::new();
        let err = set_healthy(&registry, &[]).await.unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn non_capable_component_is_silently_dropped() {
        let registry = ComponentRegistry::new();
        registry.register(make("gpu", false, true)).await.unwrap();
        let result = set_healthy(&registry, &["gpu".to_string()]).await.unwrap();
        assert!(result.successful.is_empty());
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn capable_component_succeeds_or_fails() {
        let registry = ComponentRegistry::new();
        registry.register(make("disk", true, true)).await.unwrap();
        registry.register(make("nic", true, false)).await.unwrap();
        let result = set_healthy(&registry, &["disk".to_string(), "nic".to_string()])
            .await
            .unwrap();
        assert_eq!(result.successful, vec!["disk".to_string()]);
        assert_eq!(
            result.failed.get("nic").map(String::as_str),
            Some("hardware still reporting a fault")
        );
    }
}
