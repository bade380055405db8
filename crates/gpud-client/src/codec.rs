//! Request/response (de)serialization symmetric with the façade's
//! `negotiate::Codec` (§4.8 "codec symmetry"). Gzip inflation is handled
//! transparently by `reqwest`'s own `gzip` feature (it sends
//! `Accept-Encoding: gzip` and strips+decodes `Content-Encoding: gzip`
//! before we ever see the bytes), so this module only covers the JSON/YAML
//! boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, Error, Result};

/// The wire format this client speaks. `Json` by default; switch to `Yaml`
/// via [`crate::Client::with_codec`] to exercise both directions (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Json,
    Yaml,
}

impl Codec {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Codec::Json => "application/json",
            Codec::Yaml => "application/yaml",
        }
    }

    pub(crate) fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string())),
            Codec::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| Error::Encode(e.to_string())),
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| Error::Codec {
                codec: "json",
                source: CodecError::Json(e),
            }),
            Codec::Yaml => serde_yaml::from_slice(bytes).map_err(|e| Error::Codec {
                codec: "yaml",
                source: CodecError::Yaml(e),
            }),
        }
    }
}
