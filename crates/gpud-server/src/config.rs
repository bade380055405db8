//! Server-side ambient configuration (SPEC_FULL §10.3): bind address, TLS
//! material, and the façade's request deadline. Built with a builder-style
//! config pattern rather than a generic settings blob; `gpud-server` never
//! reads the process environment itself — the binary constructs this and
//! hands it in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where the façade's TLS material comes from (§6 "HTTP API (TLS...)").
#[derive(Debug, Clone)]
pub enum TlsMaterial {
    /// Load a cert/key pair from disk.
    Files { cert_path: PathBuf, key_path: PathBuf },
    /// Generate a self-signed cert/key pair in-process at startup. Intended
    /// for local development and tests; the client library's standard
    /// client accepts self-signed certs via its own toggle (§4.8, §6).
    SelfSigned { subject_alt_names: Vec<String> },
}

impl Default for TlsMaterial {
    fn default() -> Self {
        TlsMaterial::SelfSigned {
            subject_alt_names: vec!["localhost".to_string()],
        }
    }
}

/// Façade configuration (§4.7, §5 "Never-block property").
#[derive(Debug, Clone)]
pub struct ServerConfig {
    bind_addr: SocketAddr,
    tls: TlsMaterial,
    request_deadline: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            tls: TlsMaterial::default(),
            request_deadline: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[must_use]
    pub fn tls(&self) -> &TlsMaterial {
        &self.tls
    }

    #[must_use]
    pub fn request_deadline(&self) -> Duration {
        self.request_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ServerConfig::new("127.0.0.1:8080".parse().unwrap())
            .with_request_deadline(Duration::from_secs(5));
        assert_eq!(cfg.request_deadline(), Duration::from_secs(5));
        assert!(matches!(cfg.tls(), TlsMaterial::SelfSigned { .. }));
    }
}
