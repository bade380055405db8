//! Custom-plugin lifecycle (C5, §4.5): declarative, script-backed
//! components. A plugin spec is validated, turned into a [`Component`] whose
//! [`Probe`] runs a shell pipeline, and inserted into the registry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::component::{
    case_fold, Capability, Component, Health, HealthState, Probe, ProbeContext, RunMode,
};
use crate::error::{Error, Result};
use crate::registry::ComponentRegistry;

/// Whether a plugin runs on every scheduler tick (and on trigger) or
/// exactly once at registration (§4.3 "Init-type plugins").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Component,
    Init,
}

/// A single shell step (§9 "Script execution"). `script` is run via `sh -c`;
/// its stdout is captured and threaded to the next step's stdin, or to the
/// parser if this is the last step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub script: String,
}

/// One extracted field (§4.5 validation rules, §8 scenario 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPathField {
    pub field: String,
    pub query: String,
}

/// Parser configuration applied to the final step's stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSpec {
    pub json_paths: Vec<JsonPathField>,
    /// When `true`, an unresolved `json_path.query` fails the check instead
    /// of being silently skipped (SPEC_FULL §11, resolving the parser
    /// skip-on-miss open question from §9).
    #[serde(default)]
    pub strict: bool,
}

/// A custom-plugin registration request (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSpec {
    pub plugin_name: String,
    #[serde(default = "default_plugin_type")]
    pub plugin_type: PluginType,
    #[serde(default = "default_run_mode")]
    pub run_mode: RunMode,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub interval_seconds: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub parser: Option<ParserSpec>,
}

fn default_plugin_type() -> PluginType {
    PluginType::Component
}

fn default_run_mode() -> RunMode {
    RunMode::Manual
}

impl PluginSpec {
    /// The name the component will be registered under: the plugin name,
    /// case-folded with camelCase boundaries hyphenated (§8 scenario 4:
    /// `FooBar` → `foo-bar`).
    #[must_use]
    pub fn component_name(&self) -> String {
        derive_component_name(&self.plugin_name)
    }

    /// Validation rules, enforced in order, first failure wins (§4.5).
    pub fn validate(&self) -> Result<()> {
        if self.plugin_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "plugin_name must not be empty".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(Error::InvalidArgument(
                "steps must not be empty".to_string(),
            ));
        }
        for step in &self.steps {
            if step.script.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "step '{}' has an empty script",
                    step.name
                )));
            }
        }
        if let Some(parser) = &self.parser {
            let mut seen = HashSet::new();
            for path in &parser.json_paths {
                if path.field.trim().is_empty() {
                    return Err(Error::InvalidArgument(
                        "json_path.field must not be empty".to_string(),
                    ));
                }
                if !seen.insert(path.field.clone()) {
                    return Err(Error::InvalidArgument(format!(
                        "json_path.field '{}' is not unique within the parser",
                        path.field
                    )));
                }
                if jsonpath_lib::Selector::new().str_path(&path.query).is_err() {
                    return Err(Error::InvalidArgument(format!(
                        "json_path.query '{}' is not a valid JSONPath expression",
                        path.query
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Hyphenates camelCase/PascalCase boundaries and letter/digit boundaries,
/// folds to lowercase, and replaces any remaining non-alphanumeric run with
/// a single hyphen.
#[must_use]
pub fn derive_component_name(plugin_name: &str) -> String {
    #[derive(PartialEq, Eq)]
    enum Kind {
        None,
        Lower,
        Upper,
        Digit,
    }

    let mut out = String::with_capacity(plugin_name.len() + 4);
    let mut prev = Kind::None;
    for c in plugin_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            let kind = if c.is_ascii_digit() {
                Kind::Digit
            } else if c.is_uppercase() {
                Kind::Upper
            } else {
                Kind::Lower
            };
            let boundary = matches!(
                (&prev, &kind),
                (Kind::Lower | Kind::Digit, Kind::Upper)
                    | (Kind::Lower | Kind::Upper, Kind::Digit)
                    | (Kind::Digit, Kind::Lower | Kind::Upper)
            );
            if boundary {
                out.push('-');
            }
            out.extend(c.to_lowercase());
            prev = kind;
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev = Kind::None;
        }
    }
    out.trim_matches('-').to_string()
}

/// Runs a plugin's `steps` against `cancel`, returning the raw (exit code,
/// final stdout) needed before parsing. `Err` means the step pipeline itself
/// failed (non-zero exit or spawn failure); the caller folds it into an
/// Unhealthy HS rather than propagating it further.
async fn run_steps(steps: &[Step], cancel: &tokio_util::sync::CancellationToken) -> std::result::Result<Vec<u8>, String> {
    let mut input: Option<Vec<u8>> = None;
    for step in steps {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&step.script);
        command.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| format!("step '{}' failed to start: {e}", step.name))?;

        if let (Some(bytes), Some(mut stdin)) = (input.take(), child.stdin.take()) {
            let _ = stdin.write_all(&bytes).await;
            drop(stdin);
        }

        let pid = child.id();
        let wait = async {
            child
                .wait_with_output()
                .await
                .map_err(|e| format!("step '{}' failed: {e}", step.name))
        };

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // kill_on_drop only signals the direct child; process_group(0)
                // put it in its own group so its own descendants are reachable
                // through the negated pid too.
                #[cfg(unix)]
                if let Some(pid) = pid {
                    unsafe { libc::kill(-(pid as i32), libc::SIGKILL); }
                }
                return Err(format!("step '{}' canceled", step.name));
            }
            result = wait => result?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "step '{}' exited with {}: {}",
                step.name,
                output.status,
                stderr.trim()
            ));
        }
        input = Some(output.stdout);
    }
    Ok(input.unwrap_or_default())
}

/// Applies a [`ParserSpec`] to a step pipeline's final stdout (§4.1, §9).
fn apply_parser(
    parser: &ParserSpec,
    stdout: &[u8],
) -> Result<(HashMap<String, String>, Option<Health>)> {
    let mut extra_info = HashMap::new();
    let mut health_override = None;

    let value: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| Error::InvalidArgument(format!("plugin output is not valid JSON: {e}")))?;

    for path in &parser.json_paths {
        let resolved = jsonpath_lib::select(&value, &path.query).unwrap_or_default();
        match resolved.first() {
            Some(found) => {
                let as_text = match found {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if path.field == "health" {
                    if let Some(h) = Health::from_wire_str(as_text.trim_matches('"')) {
                        health_override = Some(h);
                    }
                }
                extra_info.insert(path.field.clone(), as_text);
            }
            None if parser.strict => {
                return Err(Error::FailedPrecondition(format!(
                    "plugin parser: path '{}' did not resolve",
                    path.field
                )));
            }
            None => {}
        }
    }

    Ok((extra_info, health_override))
}

struct ScriptProbe {
    steps: Vec<Step>,
    parser: Option<ParserSpec>,
}

#[async_trait]
impl Probe for ScriptProbe {
    async fn probe(&self, ctx: &ProbeContext) -> HealthState {
        let stdout = match run_steps(&self.steps, &ctx.cancel).await {
            Ok(stdout) => stdout,
            Err(reason) => {
                return HealthState::unhealthy(
                    &ctx.component_name,
                    &ctx.component_type,
                    ctx.run_mode,
                    reason,
                );
            }
        };

        let Some(parser) = &self.parser else {
            return HealthState {
                component_name: ctx.component_name.clone(),
                name: "ok".to_string(),
                health: Health::Healthy,
                reason: "steps completed successfully".to_string(),
                extra_info: HashMap::new(),
                time_unix_seconds: crate::component::now_unix_seconds(),
                component_type: ctx.component_type.clone(),
                run_mode: ctx.run_mode,
            };
        };

        match apply_parser(parser, &stdout) {
            Ok((extra_info, health_override)) => HealthState {
                component_name: ctx.component_name.clone(),
                name: "ok".to_string(),
                health: health_override.unwrap_or(Health::Healthy),
                reason: "steps completed successfully".to_string(),
                extra_info,
                time_unix_seconds: crate::component::now_unix_seconds(),
                component_type: ctx.component_type.clone(),
                run_mode: ctx.run_mode,
            },
            Err(err) => HealthState::unhealthy(
                &ctx.component_name,
                &ctx.component_type,
                ctx.run_mode,
                err.to_string(),
            ),
        }
    }
}

fn build_component(spec: &PluginSpec) -> Component {
    Component {
        name: spec.component_name(),
        tags: spec.tags.iter().map(|t| t.to_string()).collect(),
        run_mode: spec.run_mode,
        interval: Duration::from_secs(spec.interval_seconds),
        timeout: Duration::from_secs(spec.timeout_seconds),
        capabilities: [Capability::Deregisterable, Capability::Triggerable]
            .into_iter()
            .collect(),
        component_type: "custom-plugin".to_string(),
        probe: Box::new(ScriptProbe {
            steps: spec.steps.clone(),
            parser: spec.parser.clone(),
        }),
        set_healthy: None,
    }
}

/// Validates `spec`, builds its component, and registers it (§4.5). If
/// `plugin_type` is [`PluginType::Init`], runs it once synchronously to
/// completion before returning, per §4.3 "Init-type plugins"; an init
/// failure is surfaced in the returned [`HealthState`] but does not prevent
/// registration.
pub async fn register(registry: &ComponentRegistry, spec: &PluginSpec) -> Result<Option<HealthState>> {
    spec.validate()?;
    let component = build_component(spec);
    let registered = registry.register(component).await?;

    if spec.plugin_type == PluginType::Init {
        let ctx = ProbeContext {
            component_name: registered.name.clone(),
            component_type: registered.component_type.clone(),
            run_mode: registered.run_mode,
            cancel: tokio_util::sync::CancellationToken::new(),
        };
        let state = registered.probe.probe(&ctx).await;
        return Ok(Some(state));
    }
    Ok(None)
}

/// Validates `spec` and atomically replaces the existing registration for
/// its derived component name (observers see either the old or the new
/// component, never a torn combination — §3 invariant). Fails with
/// [`Error::NotFound`] if no plugin with that name is registered (§4.5
/// `update`).
pub async fn update(registry: &ComponentRegistry, spec: &PluginSpec) -> Result<()> {
    spec.validate()?;
    registry.update(build_component(spec)).await?;
    Ok(())
}

/// Removes a plugin's component registration (§4.5 `deregister`).
pub async fn deregister(registry: &ComponentRegistry, component_name: &str) -> Result<()> {
    registry.deregister(&case_fold(component_name)).await
}

/// Tracks the original [`PluginSpec`] for every registered custom plugin, by
/// its derived component name. The registry only knows about the built
/// [`Component`]; `/v1/plugins` (§4.5 `list`) needs the original
/// [`PluginSpec`] back, so `gpud-server` keeps one of these alongside a
/// `Runtime`'s registry.
#[derive(Clone, Default)]
pub struct PluginSpecStore {
    inner: Arc<RwLock<BTreeMap<String, PluginSpec>>>,
}

impl PluginSpecStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, spec: PluginSpec) {
        self.inner
            .write()
            .await
            .insert(spec.component_name(), spec);
    }

    pub async fn remove(&self, component_name: &str) {
        self.inner.write().await.remove(&case_fold(component_name));
    }

    /// Returns every tracked spec ordered by component name (§4.5 `list`).
    pub async fn list(&self) -> Vec<PluginSpec> {
        self.inner.read().await.values().cloned().collect()
    }
}
