//! Typed client for the GPUd component runtime's HTTP façade (C8, §4.8): the
//! symmetric peer of `gpud-server`. Knows only the wire contract, never the
//! runtime itself.
//!
//! A `reqwest::Client` wrapped in a typed struct, with a single
//! request-sending path that maps connect/timeout failures before the
//! caller ever sees a `reqwest::Error`, and a status-code check before the
//! body is decoded.

pub mod codec;
pub mod error;
pub mod models;

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use gpud_core::component::{Event, HealthState, Metric};
use gpud_core::machine_info::MachineInfo;
use gpud_core::plugin::PluginSpec;
use gpud_core::sethealthy::SetHealthyResult;
use gpud_core::trigger::TagTriggerResult;

pub use codec::Codec;
pub use error::{Error, Result};
pub use models::{ComponentInfo, Deregistered, Healthz, RegisterOutcome, UpdateOutcome};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Construction parameters for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub codec: Codec,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            codec: Codec::Json,
        }
    }
}

/// A handle to one `gpud` agent's HTTP façade.
///
/// Cloning is cheap (`reqwest::Client` is itself a cheap-clone handle over a
/// pooled connector), so callers can share one `Client` freely.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    codec: Codec,
    timeout: Duration,
    poll_interval: Duration,
}

impl Client {
    /// Builds a client from `config`. The standard client accepts
    /// self-signed server certificates (§6: "TLS; self-signed accepted by
    /// the standard client") since the agent generates its own by default.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            codec: config.codec,
            timeout: config.timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Convenience over [`Client::new`] for the common case of just pointing
    /// at a base URL with the default timeout and JSON codec.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Switches the request/response codec (§4.7: JSON default, YAML via
    /// `Content-Type`/`Accept`).
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Overrides the polling cadence used by [`Client::block_until_ready`]
    /// (§4.8: "every 1s (configurable)").
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- transport plumbing --------------------------------------------

    fn map_reqwest_err(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout.as_millis() as u64)
        } else {
            Error::Network(e.to_string())
        }
    }

    fn map_error_status(&self, status: StatusCode, bytes: &[u8]) -> Error {
        #[derive(Deserialize)]
        struct ErrorBody {
            reason: String,
        }
        let reason = serde_json::from_slice::<ErrorBody>(bytes)
            .map(|b| b.reason)
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
        if status == StatusCode::NOT_FOUND {
            Error::NotFound(reason)
        } else {
            Error::Server {
                status: status.as_u16(),
                reason,
            }
        }
    }

    /// Sends a request with no body, decoding a successful response under
    /// the configured codec. `reqwest`'s own `gzip` feature transparently
    /// inflates a gzip-encoded response before we see the bytes (§4.8).
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .header(ACCEPT, self.codec.content_type())
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.map_reqwest_err(e))?;
        if status.is_success() {
            self.codec.decode(&bytes)
        } else {
            Err(self.map_error_status(status, &bytes))
        }
    }

    /// Sends a request whose body is `value`, encoded under the configured
    /// codec (§4.7 "request bodies ... use YAML" when so configured).
    async fn send_with_body<B: Serialize, T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        value: &B,
    ) -> Result<T> {
        let bytes = self.codec.encode(value)?;
        self.send(
            builder
                .header(CONTENT_TYPE, self.codec.content_type())
                .body(bytes),
        )
        .await
    }

    fn with_components_query(req: RequestBuilder, components: &[String]) -> RequestBuilder {
        if components.is_empty() {
            req
        } else {
            req.query(&[("components", components.join(","))])
        }
    }

    // -- observation queries (§4.6, §6) ---------------------------------

    pub async fn get_components(&self) -> Result<Vec<String>> {
        self.send(self.http.get(self.url("/v1/components"))).await
    }

    pub async fn get_info(&self, components: &[String]) -> Result<Vec<ComponentInfo>> {
        let req = Self::with_components_query(self.http.get(self.url("/v1/info")), components);
        self.send(req).await
    }

    pub async fn get_health_states(&self, components: &[String]) -> Result<Vec<HealthState>> {
        let req = Self::with_components_query(self.http.get(self.url("/v1/states")), components);
        self.send(req).await
    }

    pub async fn get_events(&self, components: &[String], since_unix_seconds: i64) -> Result<Vec<Event>> {
        let req = Self::with_components_query(self.http.get(self.url("/v1/events")), components)
            .query(&[("since", since_unix_seconds)]);
        self.send(req).await
    }

    pub async fn get_metrics(&self, components: &[String], since_unix_seconds: i64) -> Result<Vec<Metric>> {
        let req = Self::with_components_query(self.http.get(self.url("/v1/metrics")), components)
            .query(&[("since", since_unix_seconds)]);
        self.send(req).await
    }

    pub async fn get_plugin_specs(&self) -> Result<Vec<PluginSpec>> {
        self.send(self.http.get(self.url("/v1/plugins"))).await
    }

    pub async fn get_machine_info(&self) -> Result<MachineInfo> {
        self.send(self.http.get(self.url("/machine-info"))).await
    }

    // -- lifecycle & trigger (§4.2, §4.4, §4.5, §6) ----------------------

    pub async fn deregister_component(&self, component_name: &str) -> Result<Deregistered> {
        let req = self
            .http
            .delete(self.url("/v1/components"))
            .query(&[("componentName", component_name)]);
        self.send(req).await
    }

    pub async fn trigger_component(&self, component_name: &str) -> Result<HealthState> {
        let req = self
            .http
            .get(self.url("/v1/components/trigger-check"))
            .query(&[("componentName", component_name)]);
        self.send(req).await
    }

    pub async fn trigger_component_by_tag(&self, tag_name: &str) -> Result<TagTriggerResult> {
        let req = self
            .http
            .get(self.url("/v1/components/trigger-tag"))
            .query(&[("tagName", tag_name)]);
        self.send(req).await
    }

    pub async fn register_custom_plugin(&self, spec: &PluginSpec) -> Result<RegisterOutcome> {
        let req = self.http.post(self.url("/v1/components/custom-plugin"));
        self.send_with_body(req, spec).await
    }

    pub async fn update_custom_plugin(&self, spec: &PluginSpec) -> Result<UpdateOutcome> {
        let req = self.http.put(self.url("/v1/components/custom-plugin"));
        self.send_with_body(req, spec).await
    }

    pub async fn set_healthy_components(&self, components: &[String]) -> Result<SetHealthyResult> {
        let req = Self::with_components_query(
            self.http.post(self.url("/v1/health-states/set-healthy")),
            components,
        );
        self.send(req).await
    }

    // -- readiness (§4.8) ------------------------------------------------

    /// Builds a throwaway client for `addr` and polls `/healthz` until it
    /// reports ready or `deadline` elapses (§4.8
    /// `block_until_server_ready(addr, deadline)`). Prefer
    /// [`Client::block_until_ready`] when a `Client` already exists for the
    /// target agent.
    pub async fn block_until_server_ready(addr: &str, deadline: Duration) -> Result<()> {
        Self::with_base_url(addr)?.block_until_ready(deadline).await
    }

    /// Polls `/healthz` every `poll_interval` (default 1s, see
    /// [`Client::with_poll_interval`]) until it answers 200 with
    /// `{"status":"ok","version":"v1"}`, or `deadline` elapses.
    pub async fn block_until_ready(&self, deadline: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        loop {
            if let Ok(response) = self.http.get(self.url("/healthz")).send().await {
                if response.status().is_success() {
                    if let Ok(body) = response.json::<Healthz>().await {
                        if body.status == "ok" && body.version == "v1" {
                            return Ok(());
                        }
                    }
                }
            }
            if start.elapsed() >= deadline {
                return Err(Error::ServerNotReady);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> Client {
        Client::with_base_url(server.uri()).unwrap()
    }

    #[tokio::test]
    async fn get_components_decodes_name_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/components"))
            .respond_with(ResponseTemplate::new(200).set_body_json(["gpu-0", "disk-0"]))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let names = client.get_components().await.unwrap();
        assert_eq!(names, vec!["gpu-0".to_string(), "disk-0".to_string()]);
    }

    #[tokio::test]
    async fn unknown_component_surfaces_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/states"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"reason": "component not found: nope"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .get_health_states(&["nope".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn non_404_error_status_is_server_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/health-states/set-healthy"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"reason": "components parameter is required"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.set_healthy_components(&[]).await.unwrap_err();
        assert!(err.is_server_not_ready());
        assert!(matches!(err, Error::Server { status: 400, .. }));
    }

    #[tokio::test]
    async fn trigger_tag_ignores_the_facades_extra_exit_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/components/trigger-tag"))
            .and(query_param("tagName", "gpu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "components": ["gpu-0", "gpu-1"],
                "success": true,
                "exit": 0,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.trigger_component_by_tag("gpu").await.unwrap();
        assert!(result.success);
        assert_eq!(result.components, vec!["gpu-0".to_string(), "gpu-1".to_string()]);
    }

    #[tokio::test]
    async fn block_until_ready_succeeds_once_healthz_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "version": "v1",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server)
            .await
            .with_poll_interval(Duration::from_millis(10));
        client.block_until_ready(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn block_until_server_ready_polls_by_address_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "version": "v1",
            })))
            .mount(&server)
            .await;

        Client::block_until_server_ready(&server.uri(), Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn block_until_ready_times_out_when_server_never_answers() {
        // No mock mounted: every request fails to connect cleanly inside wiremock's
        // own server since it's simply not serving `/healthz` with a 200.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server)
            .await
            .with_poll_interval(Duration::from_millis(10));
        let err = client
            .block_until_ready(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerNotReady));
    }
}
