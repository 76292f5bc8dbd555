//! Reading and writing the state annotation.

use mooring_core::{StateError, StateMap};
use serde_json::{Map, Value};

/// Parse the state annotation. A missing or empty annotation is an empty map.
pub fn decode_state(doc: &Value, annotation: &str) -> Result<StateMap, StateError> {
    let raw = match doc.get("annotations").and_then(|a| a.get(annotation)) {
        None | Some(Value::Null) => return Ok(StateMap::new()),
        Some(Value::String(s)) => s,
        Some(_) => return Err(StateError::NotAString),
    };
    if raw.trim().is_empty() {
        return Ok(StateMap::new());
    }
    serde_json::from_str(raw).map_err(StateError::Parse)
}

pub fn encode_state(state: &StateMap) -> Result<String, StateError> {
    serde_json::to_string(state).map_err(StateError::Encode)
}

/// Write `encoded` under `annotations[annotation]`, creating the annotations object
/// if it is absent or not an object. Non-object documents are left alone.
pub fn put_state(doc: &mut Value, annotation: &str, encoded: String) {
    let Some(obj) = doc.as_object_mut() else { return };
    let annotations = obj
        .entry("annotations")
        .or_insert_with(|| Value::Object(Map::new()));
    if !annotations.is_object() {
        *annotations = Value::Object(Map::new());
    }
    if let Some(map) = annotations.as_object_mut() {
        map.insert(annotation.to_string(), Value::String(encoded));
    }
}
