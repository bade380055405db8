//! Per-component inflight coordination shared by the scheduler (C3) and the
//! trigger protocol (C4): enforces "at most one probe of a component
//! inflight at any instant" (§8 Single-inflight) and lets a trigger coalesce
//! onto an already-running check instead of starting a parallel one (§4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;

use crate::check::run_check;
use crate::component::{Component, HealthState};
use crate::error::{Error, Result};

struct Slot {
    running: Mutex<bool>,
    last: Mutex<Option<HealthState>>,
    generation: AtomicU64,
    done: Notify,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            running: Mutex::new(false),
            last: Mutex::new(None),
            generation: AtomicU64::new(0),
            done: Notify::new(),
        }
    }
}

/// Tracks one [`Slot`] per component name. Cheap to clone; all clones share
/// the same slot table.
#[derive(Clone, Default)]
pub struct CheckCoordinator {
    slots: Arc<RwLock<HashMap<String, Arc<Slot>>>>,
}

impl CheckCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot_for(&self, name: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(name) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    /// Blocks until no check of `name` is inflight. Callers must have
    /// already removed the component from the registry before calling this,
    /// so no new check can start once the current one (if any) finishes —
    /// otherwise this could race against a fresh acquisition forever.
    ///
    /// Used by deregistration (§3 Lifecycle, §4.2): "Blocks until any
    /// scheduled check completes."
    pub async fn wait_idle(&self, name: &str) {
        let slot = match self.slots.read().await.get(name).cloned() {
            Some(slot) => slot,
            None => return,
        };
        loop {
            let notified = slot.done.notified();
            if !*slot.running.lock().await {
                return;
            }
            notified.await;
        }
    }

    /// Drops the slot for a deregistered component so it doesn't linger
    /// forever in the table. Callers should [`CheckCoordinator::wait_idle`]
    /// first.
    pub async fn forget(&self, name: &str) {
        self.slots.write().await.remove(name);
    }

    /// Scheduler entry point (§4.3): runs the check if the component is
    /// idle, or returns `None` immediately (drops the tick) if a check is
    /// already inflight.
    pub async fn try_run(
        &self,
        component: &Arc<Component>,
        cancel: &CancellationToken,
    ) -> Option<HealthState> {
        let slot = self.slot_for(&component.name).await;
        {
            let mut running = slot.running.lock().await;
            if *running {
                return None;
            }
            *running = true;
        }
        let result = run_check(component, cancel).await;
        self.finish(&slot, result.clone()).await;
        Some(result)
    }

    /// Trigger entry point (§4.4): runs the check if idle; if a check is
    /// already inflight, waits (bounded by `deadline`) for it to finish and
    /// reuses its result rather than starting a second probe.
    pub async fn run_or_coalesce(
        &self,
        component: &Arc<Component>,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<HealthState> {
        let slot = self.slot_for(&component.name).await;
        let observed_generation = slot.generation.load(Ordering::Acquire);

        let acquired = {
            let mut running = slot.running.lock().await;
            if *running {
                false
            } else {
                *running = true;
                true
            }
        };

        if acquired {
            let result = run_check(component, cancel).await;
            self.finish(&slot, result.clone()).await;
            return Ok(result);
        }

        let wait = async {
            loop {
                if slot.generation.load(Ordering::Acquire) != observed_generation {
                    if let Some(state) = slot.last.lock().await.clone() {
                        return state;
                    }
                }
                slot.done.notified().await;
            }
        };

        tokio::select! {
            state = wait => Ok(state),
            () = tokio::time::sleep(deadline) => Err(Error::DeadlineExceeded(format!(
                "timed out waiting for inflight check of '{}' to complete",
                component.name
            ))),
            () = cancel.cancelled() => Err(Error::Canceled(format!(
                "wait for inflight check of '{}' was canceled",
                component.name
            ))),
        }
    }

    async fn finish(&self, slot: &Arc<Slot>, result: HealthState) {
        *slot.last.lock().await = Some(result);
        slot.generation.fetch_add(1, Ordering::AcqRel);
        *slot.running.lock().await = false;
        slot.done.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Capability, Health, Probe, ProbeContext, RunMode};
    use async_trait::async_trait;
    use std::time::Duration;

    struct DelayedProbe {
        delay: Duration,
    }

    #[async_trait]
    impl Probe for DelayedProbe {
        async fn probe(&self, ctx: &ProbeContext) -> HealthState {
            tokio::time::sleep(self.delay).await;
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

    fn make(delay: Duration) -> Arc<Component> {
        Arc::new(Component {
            name: "gpu".to_string(),
            tags: Default::default(),
            run_mode: RunMode::Auto,
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
            capabilities: [Capability::Triggerable].into_iter().collect(),
            component_type: "gpu".to_string(),
            probe: Box::new(DelayedProbe { delay }),
            set_healthy: None,
        })
    }

    #[tokio::test]
    async fn try_run_drops_tick_while_busy() {
        let coordinator = CheckCoordinator::new();
        let component = make(Duration::from_millis(100));
        let cancel = CancellationToken::new();

        let c2 = Arc::clone(&component);
        let coord2 = coordinator.clone();
        let cancel2 = cancel.clone();
        let first = tokio::spawn(async move { coord2.try_run(&c2, &cancel2).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = coordinator.try_run(&component, &cancel).await;
        assert!(second.is_none());

        let first_result = first.await.unwrap();
        assert!(first_result.is_some());
    }

    #[tokio::test]
    async fn wait_idle_blocks_until_inflight_check_finishes() {
        let coordinator = CheckCoordinator::new();
        let component = make(Duration::from_millis(100));
        let cancel = CancellationToken::new();

        let c2 = Arc::clone(&component);
        let coord2 = coordinator.clone();
        let cancel2 = cancel.clone();
        let scheduler_run = tokio::spawn(async move { coord2.try_run(&c2, &cancel2).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let started = tokio::time::Instant::now();
        coordinator.wait_idle(&component.name).await;
        assert!(
            started.elapsed() >= Duration::from_millis(60),
            "wait_idle returned before the inflight check completed"
        );
        assert!(scheduler_run.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_for_unknown_component() {
        let coordinator = CheckCoordinator::new();
        coordinator.wait_idle("never-registered").await;
    }

    #[tokio::test]
    async fn trigger_coalesces_onto_inflight_check() {
        let coordinator = CheckCoordinator::new();
        let component = make(Duration::from_millis(80));
        let cancel = CancellationToken::new();

        let c2 = Arc::clone(&component);
        let coord2 = coordinator.clone();
        let cancel2 = cancel.clone();
        let scheduler_run = tokio::spawn(async move { coord2.try_run(&c2, &cancel2).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let triggered = coordinator
            .run_or_coalesce(&component, &cancel, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(triggered.health, Health::Healthy);
        assert!(scheduler_run.await.unwrap().is_some());
    }
}
