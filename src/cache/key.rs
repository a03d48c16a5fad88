//! Cache key fingerprinting.
//!
//! A key is `fingerprint(text) + "_" + fingerprint(canonical_json(options))`.
//! Fingerprints are stable across processes so persisted snapshots stay valid.
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex chars kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Deterministic short hash of `content`.
#[must_use]
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

/// JSON serialization with object keys sorted at every level, so that
/// `{a:1,b:2}` and `{b:2,a:1}` produce the same string.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Build the cache key for `text` analyzed with `options`.
#[must_use]
pub fn generate_key(text: &str, options: &Value) -> String {
    format!(
        "{}_{}",
        fingerprint(text),
        fingerprint(&canonical_json(options))
    )
}

/// Text-fingerprint component of a key.
#[must_use]
pub fn text_component(key: &str) -> &str {
    key.split_once('_').map(|(text, _)| text).unwrap_or(key)
}
