//! StateKey derivation and synthetic service ids.
//!
//! Keys are URL-safe, padded base64 so they can sit in a JSON object key and be
//! decoded again when a service id has to be generated from them.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use mooring_core::{ResourceId, StateError};
use serde_json::Value;

/// Key for one rule slot: `name/namespace/host/path/port`, base64 encoded.
///
/// Names, namespaces, hosts and ports never contain `/`, so the only ambiguous
/// segment (the path) is pinned between fixed-position fields.
pub fn rule_key(id: &ResourceId, host: &str, path: &str, port: &str) -> String {
    let raw = format!("{}/{}/{}/{}/{}", id.name, id.namespace, host, path, port);
    URL_SAFE.encode(raw.as_bytes())
}

/// Key for one certificate slot. Depends only on the local certificate name.
pub fn cert_key(name: &str) -> String {
    URL_SAFE.encode(name.as_bytes())
}

pub fn decode_key(key: &str) -> Result<Vec<u8>, StateError> {
    URL_SAFE.decode(key).map_err(|e| StateError::Key(e.to_string()))
}

/// `prefix + hex(md5(decoded key))`.
///
/// MD5 is what existing ingresses were saved with; swapping the digest renames every
/// generated service, so it stays until there is a migration for it.
pub fn synthetic_service_id(prefix: &str, key: &str) -> Result<String, StateError> {
    let raw = decode_key(key)?;
    let digest = md5::compute(&raw);
    Ok(format!("{}{}", prefix, hex::encode(digest.0)))
}

/// Render `targetPort` the way it participates in the key.
pub fn port_string(port: Option<&Value>) -> String {
    match port {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    // 80.0 is how some clients send an integer port
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
                    _ => n.to_string(),
                }
            }
        }
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
