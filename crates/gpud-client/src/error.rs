//! Client-side error taxonomy (§4.8, §7): the façade's HTTP status codes
//! collapse down to a handful of typed sentinels a caller can match on,
//! instead of the full `gpud_core` taxonomy (this crate never links
//! `gpud-core`'s `Error`, only its data types).

use thiserror::Error;

/// Connect/timeout errors are distinguished from API errors, and a separate
/// variant exists for responses that parsed but didn't decode into the
/// expected type.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not reach the server at all, or the connection was reset.
    #[error("failed to connect to gpud at {0}")]
    Network(String),

    /// The request exceeded its deadline before a response arrived.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The façade returned 404 (§4.8: "any 404 is surfaced as a typed
    /// NotFound error"). Carries the server's `reason` string when present.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status, with the code embedded (§4.8, §7).
    #[error("server returned {status}: {reason}")]
    Server { status: u16, reason: String },

    /// `block_until_server_ready` exhausted its deadline without observing
    /// a healthy `/healthz` (§4.8).
    #[error("gpud server was not ready within the deadline")]
    ServerNotReady,

    /// A response body failed to decode under the negotiated codec.
    #[error("failed to decode {codec}: {source}")]
    Codec {
        codec: &'static str,
        #[source]
        source: CodecError,
    },

    /// A request body failed to encode under the configured codec.
    #[error("failed to encode {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    #[must_use]
    pub fn is_server_not_ready(&self) -> bool {
        matches!(self, Error::ServerNotReady | Error::Server { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
