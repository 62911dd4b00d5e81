//! Content fingerprinting
//!
//! Fingerprints are SHA-256 hex digests. Files are fingerprinted over raw
//! bytes; configuration values over a canonical JSON encoding so that two
//! semantically identical configs always digest identically.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a byte slice, as lowercase hex.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 fingerprint of a file's contents.
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize a JSON value canonically: object keys sorted, no whitespace.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_default(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let rendered: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        to_canonical_json(v)
                    )
                })
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

/// Fingerprint of a JSON value via its canonical encoding.
pub fn digest_value(value: &Value) -> String {
    digest_bytes(to_canonical_json(value).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_bytes_stable() {
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }

    #[test]
    fn test_digest_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"file contents").unwrap();
        assert_eq!(digest_file(&path).unwrap(), digest_bytes(b"file contents"));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({ "b": 2, "a": 1 });
        assert_eq!(to_canonical_json(&value), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn test_canonical_json_nested() {
        let value = json!({ "z": [{ "y": true }, null], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&value),
            "{\"a\":{\"x\":10},\"z\":[{\"y\":true},null]}"
        );
    }

    #[test]
    fn test_digest_value_key_order_invariant() {
        let a = json!({ "lr": 0.1, "epochs": 5 });
        let b = json!({ "epochs": 5, "lr": 0.1 });
        assert_eq!(digest_value(&a), digest_value(&b));
    }
}
