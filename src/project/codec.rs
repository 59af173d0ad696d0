// Binary-to-text codec for media payloads crossing the interchange boundary
// Everything inside the crate works on raw byte buffers

use crate::error::{SyncError, SyncResult};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;

/// Encode raw bytes as standard base64
pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Decode standard base64 back to raw bytes
pub fn decode(text: &str) -> SyncResult<Vec<u8>> {
    BASE64_STANDARD
        .decode(text.trim())
        .map_err(|e| SyncError::InvalidDocument(format!("invalid base64 payload: {}", e)))
}

/// Serde adapter for optional inline payloads
pub mod optional_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| super::decode(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
