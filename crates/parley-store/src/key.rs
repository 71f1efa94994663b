//! Content-addressed cache/queue keys.
//!
//! Keys are a SHA-256 over the endpoint plus the serialized payload,
//! truncated to 128 bits of hex. Identical payloads to the same endpoint
//! always produce the same key; responses for them are interchangeable.

use sha2::{Digest, Sha256};

pub fn payload_key(endpoint: &str, payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b"\0");
    // serde_json serialization of a Value is deterministic (BTreeMap keys)
    hasher.update(payload.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
