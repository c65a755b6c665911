//! Hashing System - SHA-256 Fingerprints for Issued Documents
//!
//! Assembled document specs and issuance manifests get deterministic,
//! reproducible hashes so an issued certificate can be re-derived and
//! audited later.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of an assembled document spec. Identical template + context
/// always produce the same hash.
pub fn compute_spec_hash<T: Serialize>(document: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(document)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Issuance audit hash:
/// sha256(student_id + certificate_type + spec_hash + engine_version)
pub fn compute_issuance_hash(
    student_id: &str,
    certificate_type: &str,
    spec_hash: &str,
    engine_version: &str,
) -> String {
    let combined = format!(
        "{}:{}:{}:{}",
        student_id, certificate_type, spec_hash, engine_version
    );
    sha256_hex(combined.as_bytes())
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"certificate bytes";
        let h1 = sha256_hex(data);
        let h2 = sha256_hex(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_spec_hash_ignores_key_order() {
        let a = json!({"certificateType": "completion", "borderColor": "#c9a227"});
        let b = json!({"borderColor": "#c9a227", "certificateType": "completion"});
        assert_eq!(compute_spec_hash(&a).unwrap(), compute_spec_hash(&b).unwrap());
    }

    #[test]
    fn test_issuance_hash_varies_by_student() {
        let h1 = compute_issuance_hash("s1", "completion", "abc", "1.0.0");
        let h2 = compute_issuance_hash("s2", "completion", "abc", "1.0.0");
        assert_ne!(h1, h2);
    }
}
