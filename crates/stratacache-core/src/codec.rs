//! Byte codecs for cached payloads.
//!
//! Values are stored as `Option<T>`: `Some` encodes a real value, `None`
//! (JSON `null` / MessagePack nil) encodes a cached negative result. One
//! decode therefore distinguishes "cached nothing" from "never cached"
//! without any wrapper struct.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};

/// Payload codec used by a provider. MessagePack is the compact default for
/// distributed tiers; JSON keeps payloads inspectable in shared backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    Json,
    #[default]
    MessagePack,
}

impl Codec {
    /// Codec name as recorded in provider metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::MessagePack => "msgpack",
        }
    }

    /// Encode a value (or a negative result as `None`) to bytes.
    pub fn encode<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec(&value)
                .map_err(|e| CacheError::serialization(e.to_string())),
            Self::MessagePack => rmp_serde::to_vec(&value)
                .map_err(|e| CacheError::serialization(e.to_string())),
        }
    }

    /// Decode bytes back into `Some(value)` or the `None` negative marker.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>> {
        match self {
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| CacheError::deserialization(e.to_string())),
            Self::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| CacheError::deserialization(e.to_string())),
        }
    }
}
