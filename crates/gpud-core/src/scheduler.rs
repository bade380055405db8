//! Periodic scheduler (C3, §4.3): one loop per auto-mode component, with
//! startup jitter, at-most-one-inflight enforcement, and cooperative
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::coordinator::CheckCoordinator;
use crate::registry::ComponentRegistry;
use crate::store::ObservationStore;

/// Owns the cancellation tree for every auto-mode loop plus the handles
/// needed to join them on shutdown.
///
/// Follows the one-way-ownership rule from SPEC_FULL §9: the registry owns
/// components; the scheduler only holds their names and re-resolves an
/// `Arc<Component>` on every tick, so a deregistered component simply stops
/// appearing rather than requiring the scheduler to hold a strong reference.
pub struct PeriodicScheduler {
    registry: ComponentRegistry,
    store: ObservationStore,
    coordinator: CheckCoordinator,
    root_cancel: CancellationToken,
    loops: RwLock<Vec<(String, CancellationToken, tokio::task::JoinHandle<()>)>>,
}

impl PeriodicScheduler {
    #[must_use]
    pub fn new(registry: ComponentRegistry, store: ObservationStore, coordinator: CheckCoordinator) -> Self {
        Self {
            registry,
            store,
            coordinator,
            root_cancel: CancellationToken::new(),
            loops: RwLock::new(Vec::new()),
        }
    }

    /// Starts a loop for every currently-registered auto-mode component with
    /// `interval > 0`. Safe to call once at startup; components registered
    /// afterwards should call [`PeriodicScheduler::start_component`]
    /// individually.
    pub async fn start_all(&self) {
        for component in self.registry.list().await {
            if component.run_mode == crate::component::RunMode::Auto
                && !component.interval.is_zero()
            {
                self.start_component(&component.name).await;
            }
        }
    }

    /// Starts a dedicated loop for one auto-mode component, e.g. right after
    /// a custom plugin registers itself (C5).
    #[instrument(skip(self))]
    pub async fn start_component(&self, name: &str) {
        let component = match self.registry.get(name).await {
            Ok(c) => c,
            Err(_) => return,
        };
        if component.run_mode != crate::component::RunMode::Auto || component.interval.is_zero() {
            return;
        }

        let cancel = self.root_cancel.child_token();
        let registry = self.registry.clone();
        let store = self.store.clone();
        let coordinator = self.coordinator.clone();
        let name = component.name.clone();
        let interval = component.interval;

        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_loop(registry, store, coordinator, name, interval, loop_cancel).await;
        });

        self.loops
            .write()
            .await
            .push((component.name.clone(), cancel, handle));
    }

    /// Cancels any existing loop for `name` and starts a fresh one if the
    /// freshly-registered component is still auto-mode. Used after a custom
    /// plugin update (§4.5) swaps in a component whose `run_mode` or
    /// `interval` may have changed — a bare `start_component` would leave a
    /// stale loop running against the old interval alongside a new one.
    #[instrument(skip(self))]
    pub async fn restart_component(&self, name: &str) {
        self.stop_component(name).await;
        self.start_component(name).await;
    }

    /// Cancels (without waiting for drain) every loop registered for `name`.
    /// A component is re-resolved from the registry on every tick, so a
    /// loop whose component has already been replaced simply exits next
    /// time it wakes; this additionally cancels it so it doesn't fire once
    /// more first on the old interval.
    pub async fn stop_component(&self, name: &str) {
        let key = crate::component::case_fold(name);
        let mut loops = self.loops.write().await;
        loops.retain(|(loop_name, cancel, _handle)| {
            if crate::component::case_fold(loop_name) == key {
                cancel.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Cancels every loop and waits for each to drain its inflight check
    /// (§4.3 Shutdown).
    pub async fn shutdown(&self) {
        self.root_cancel.cancel();
        let mut loops = self.loops.write().await;
        for (name, _cancel, handle) in loops.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(component = %name, error = %err, "scheduler loop panicked");
            }
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &CheckCoordinator {
        &self.coordinator
    }
}

async fn run_loop(
    registry: ComponentRegistry,
    store: ObservationStore,
    coordinator: CheckCoordinator,
    name: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let jitter = {
        let mut rng = rand::thread_rng();
        Duration::from_secs_f64(rng.gen_range(0.0..1.0) * interval.as_secs_f64())
    };

    tokio::select! {
        () = tokio::time::sleep(jitter) => {}
        () = cancel.cancelled() => return,
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(component = %name, "scheduler loop exiting on cancellation");
                return;
            }
            _ = ticker.tick() => {
                let Ok(component) = registry.get(&name).await else {
                    info!(component = %name, "component no longer registered, stopping loop");
                    return;
                };
                match coordinator.try_run(&component, &cancel).await {
                    Some(state) => {
                        store
                            .put_state(&crate::component::case_fold(&name), state)
                            .await;
                    }
                    None => debug!(component = %name, "tick dropped, check already inflight"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Capability, Health, HealthState, Probe, ProbeContext, RunMode};
    use crate::store::ObservationStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        async fn probe(&self, ctx: &ProbeContext) -> HealthState {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HealthState {
                component_name: ctx.component_name.clone(),
                name: "ok".to_string(),
                health: Health::Healthy,
                reason: "fine".to_string(),
                extra_info: Default::default(),
                time_unix_seconds: 0,
                component_type: ctx.component_type.clone(),
                run_mode: ctx.run_mode,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_interval_and_records_state() {
        let registry = ComponentRegistry::new();
        let store = ObservationStore::new(16);
        let calls = Arc::new(AtomicUsize::new(0));

        registry
            .register(crate::component::Component {
                name: "gpu".to_string(),
                tags: Default::default(),
                run_mode: RunMode::Auto,
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(5),
                capabilities: [Capability::Triggerable].into_iter().collect(),
                component_type: "gpu".to_string(),
                probe: Box::new(CountingProbe {
                    calls: Arc::clone(&calls),
                }),
                set_healthy: None,
            })
            .await
            .unwrap();

        let scheduler = PeriodicScheduler::new(registry, store.clone(), CheckCoordinator::new());
        scheduler.start_all().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
        let states = store.get_states(&["gpu".to_string()]).await.unwrap();
        assert_eq!(states.len(), 1);

        scheduler.shutdown().await;
    }
}
