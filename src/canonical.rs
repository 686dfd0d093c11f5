//! Canonical serialization and content digests
//!
//! Produces byte-identical output for logically-identical documents so
//! digests are stable across processes and runtimes. Two normalizations
//! apply: object keys are emitted in sorted order (`serde_json`'s default
//! map is ordered), and every `timestamp`/`writeTimestamp` field is
//! rendered as a decimal string, because the stored form and the
//! in-memory form differ (wide integer vs text) and naive re-encoding
//! would change the digest without any semantic change.

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Field names carrying epoch-millis values that must be textual in the
/// canonical form.
const MILLIS_FIELDS: [&str; 2] = ["timestamp", "writeTimestamp"];

/// Deterministically encode any serializable document into a JSON
/// string suitable for storage and hashing. Pure, no I/O.
pub fn canonical_string<T: Serialize>(doc: &T) -> Result<String> {
    let mut value = serde_json::to_value(doc)?;
    normalize(&mut value);
    Ok(serde_json::to_string(&value)?)
}

/// Byte form of [`canonical_string`].
pub fn canonical_bytes<T: Serialize>(doc: &T) -> Result<Vec<u8>> {
    Ok(canonical_string(doc)?.into_bytes())
}

/// SHA-256 over the given bytes, rendered as lowercase hex (64 chars).
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Canonicalize and digest in one step.
pub fn digest_document<T: Serialize>(doc: &T) -> Result<String> {
    Ok(digest_hex(&canonical_bytes(doc)?))
}

fn normalize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if MILLIS_FIELDS.contains(&key.as_str()) {
                    if let Value::Number(n) = child {
                        *child = Value::String(n.to_string());
                        continue;
                    }
                }
                normalize(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize(item);
            }
        }
        _ => {}
    }
}
