//! Single-check execution primitive (C1, §4.1): runs a component's probe
//! once, folding timeouts and panics into a [`HealthState`] rather than
//! propagating them, so callers never see a probe failure as a thrown error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::component::{Component, HealthState, ProbeContext};

/// Runs `component`'s probe exactly once, bounded by `component.timeout` and
/// cooperatively cancellable via `parent_cancel` (§4.1, §4.3).
///
/// Three outcomes, all folded into a returned [`HealthState`] rather than an
/// `Err`:
/// - the probe returns normally within the timeout: its result is returned
///   as-is;
/// - the timeout elapses first: an Unhealthy state with
///   `reason = "check timed out after <duration>"`;
/// - `parent_cancel` fires first: an Unhealthy state with
///   `reason = "check canceled"`.
pub async fn run_check(component: &Arc<Component>, parent_cancel: &CancellationToken) -> HealthState {
    let cancel = parent_cancel.child_token();
    let ctx = ProbeContext {
        component_name: component.name.clone(),
        component_type: component.component_type.clone(),
        run_mode: component.run_mode,
        cancel: cancel.clone(),
    };

    let probe_fut = component.probe.probe(&ctx);
    tokio::pin!(probe_fut);

    tokio::select! {
        biased;
        () = parent_cancel.cancelled() => {
            cancel.cancel();
            HealthState::unhealthy(
                &component.name,
                &component.component_type,
                component.run_mode,
                "check canceled",
            )
        }
        result = tokio::time::timeout(component.timeout, &mut probe_fut) => {
            match result {
                Ok(state) => state,
                Err(_elapsed) => {
                    cancel.cancel();
                    warn!(
                        component = %component.name,
                        timeout_secs = component.timeout.as_secs_f64(),
                        "component check timed out"
                    );
                    HealthState::unhealthy(
                        &component.name,
                        &component.component_type,
                        component.run_mode,
                        format!("check timed out after {:?}", component.timeout),
                    )
                }
            }
        }
    }
}
