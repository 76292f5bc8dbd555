//! TLS certificate bindings: `ns:cert` for the client, bare `cert` in storage.

use mooring_core::{StateMap, QUALIFIER_SEP};
use serde_json::{Map, Value};

use crate::key::cert_key;

pub const CERTIFICATE_ID: &str = "certificateId";

fn tls_entries_mut(doc: &mut Value) -> impl Iterator<Item = &mut Map<String, Value>> {
    doc.get_mut("tls")
        .and_then(|v| v.as_array_mut())
        .into_iter()
        .flat_map(|certs| certs.iter_mut())
        .filter_map(|c| c.as_object_mut())
}

/// Put back the qualified id recorded for each local certificate name.
/// Entries with no recorded state keep whatever id they carry.
pub fn expand_certs(doc: &mut Value, old: &StateMap) {
    for cert in tls_entries_mut(doc) {
        let Some(Value::String(name)) = cert.get_mut(CERTIFICATE_ID) else { continue };
        if let Some(qualified) = old.get(&cert_key(name)) {
            *name = qualified.clone();
        }
    }
}

/// Reduce `ns:cert` to `cert`, remembering the qualified form under the cert key.
/// Ids that are not exactly two parts are left untouched and not recorded.
pub fn compact_certs(doc: &mut Value, new_state: &mut StateMap) {
    for cert in tls_entries_mut(doc) {
        let Some(Value::String(id)) = cert.get_mut(CERTIFICATE_ID) else { continue };
        let parts: Vec<&str> = id.split(QUALIFIER_SEP).collect();
        let [_, local] = parts.as_slice() else { continue };
        let local = local.to_string();
        new_state.insert(cert_key(&local), id.clone());
        *id = local;
    }
}
