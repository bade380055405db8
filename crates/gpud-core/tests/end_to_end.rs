//! End-to-end scenarios driven through `Runtime` alone, no HTTP involved
//! (scenarios 1, 2, 4 and the registration-monotonicity invariant).

use gpud_core::component::{Health, RunMode};
use gpud_core::plugin::{PluginSpec, PluginType, Step};
use gpud_core::Runtime;

fn manual_spec(name: &str, script: String) -> PluginSpec {
    PluginSpec {
        plugin_name: name.to_string(),
        plugin_type: PluginType::Component,
        run_mode: RunMode::Manual,
        timeout_seconds: 30,
        interval_seconds: 0,
        tags: vec![],
        steps: vec![Step {
            name: "touch".to_string(),
            script,
        }],
        parser: None,
    }
}

#[tokio::test]
async fn manual_plugin_is_queryable_before_and_healthy_after_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("probe1");
    let runtime = Runtime::new();

    let spec = manual_spec("probe1", format!("echo x > {}", marker.display()));
    let initial = runtime.register_plugin(&spec).await.unwrap();
    assert!(initial.is_none(), "manual plugins have no initial probe result");

    let states = runtime
        .store()
        .get_states(&["probe-1".to_string()])
        .await
        .unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].name, "initializing");

    let triggered = runtime.trigger("probe-1").await.unwrap();
    assert_eq!(triggered.run_mode, RunMode::Manual);
    assert_eq!(triggered.health, Health::Healthy);
    assert!(marker.exists());
}

#[tokio::test]
async fn init_plugin_runs_its_step_synchronously_at_registration() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("init-marker");
    let runtime = Runtime::new();

    let mut spec = manual_spec("boot-check", format!("printf 'INIT-OK' > {}", marker.display()));
    spec.plugin_type = PluginType::Init;

    let initial = runtime.register_plugin(&spec).await.unwrap();
    assert!(initial.is_some());
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "INIT-OK");
}

#[tokio::test]
async fn case_folded_names_resolve_to_the_same_registration() {
    let runtime = Runtime::new();
    let mut spec = manual_spec("FooBar", "echo x".to_string());
    spec.plugin_name = "FooBar".to_string();

    runtime.register_plugin(&spec).await.unwrap();

    let names = runtime.registry().list().await;
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].name, "foo-bar");

    let states = runtime
        .store()
        .get_states(&["FOO-BAR".to_string()])
        .await
        .unwrap();
    assert_eq!(states.len(), 1);
}

#[tokio::test]
async fn registration_monotonicity_holds_until_deregister_succeeds() {
    let runtime = Runtime::new();
    let spec = manual_spec("probe1", "echo x".to_string());
    runtime.register_plugin(&spec).await.unwrap();

    assert!(runtime
        .registry()
        .list()
        .await
        .iter()
        .any(|c| c.name == "probe-1"));

    runtime.deregister_component("probe-1").await.unwrap();

    assert!(!runtime
        .registry()
        .list()
        .await
        .iter()
        .any(|c| c.name == "probe-1"));
    assert!(runtime.trigger("probe-1").await.unwrap_err().is_not_found());
}
