//! Ambient configuration for the `gpud` binary (SPEC_FULL §10.3). Loaded
//! from environment variables (optionally via a `.env` file); the library
//! crates themselves never depend on `config` or read the environment —
//! this module exists only to turn ambient settings into the plain structs
//! `gpud_server::ServerConfig` already accepts.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

fn default_bind_addr() -> String {
    "0.0.0.0:9999".to_string()
}

fn default_request_deadline_secs() -> u64 {
    30
}

fn default_subject_alt_names() -> Vec<String> {
    vec!["localhost".to_string()]
}

/// Raw settings as they appear in the environment, before being turned into
/// `gpud_server::ServerConfig`. Scoped to what this thin binary actually
/// needs to wire up.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    #[serde(default = "default_subject_alt_names")]
    pub tls_subject_alt_names: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_deadline_secs: default_request_deadline_secs(),
            tls_cert_path: None,
            tls_key_path: None,
            tls_subject_alt_names: default_subject_alt_names(),
        }
    }
}

/// Loads configuration from `GPUD_*` environment variables, layering
/// `Environment::with_prefix` over the embedded defaults above.
pub fn load() -> Result<AppConfig> {
    let config = Config::builder()
        .set_default("bind_addr", default_bind_addr())?
        .set_default("request_deadline_secs", default_request_deadline_secs())?
        .set_default("tls_subject_alt_names", default_subject_alt_names())?
        .add_source(
            Environment::with_prefix("GPUD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to build configuration")?;

    config.try_deserialize().context("failed to deserialize configuration")
}

impl AppConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind address: {}", self.bind_addr))
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn tls(&self) -> gpud_server::TlsMaterial {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert_path), Some(key_path)) => gpud_server::TlsMaterial::Files {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            },
            _ => gpud_server::TlsMaterial::SelfSigned {
                subject_alt_names: self.tls_subject_alt_names.clone(),
            },
        }
    }
}
