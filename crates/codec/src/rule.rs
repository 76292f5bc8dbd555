//! Rewrites one rule target between its client and storage forms.

use metrics::counter;
use mooring_core::{StateMap, WorkloadIds, QUALIFIER_SEP, WORKLOAD_SEP};
use serde_json::{Map, Value};
use tracing::warn;

use crate::key::synthetic_service_id;

pub const SERVICE_ID: &str = "serviceId";
pub const WORKLOAD_IDS: &str = "workloadIds";
pub const TARGET_PORT: &str = "targetPort";

/// Toward the client: restore workload bindings recorded under `key`, or qualify the
/// service id with `namespace` when the rule is service-backed.
///
/// The stored id is always prefixed, even when it contains `:` itself, so that
/// [`strip_qualifier`] on the next save gives back exactly the stored id.
pub fn expand_target(target: &mut Map<String, Value>, key: &str, namespace: &str, old: &StateMap) {
    if let Some(joined) = old.get(key).filter(|v| !v.is_empty()) {
        let ids = split_workloads(joined).into_iter().map(Value::String).collect();
        target.insert(WORKLOAD_IDS.to_string(), Value::Array(ids));
        target.remove(SERVICE_ID);
        return;
    }

    if namespace.is_empty() { return; }
    if let Some(Value::String(svc)) = target.get_mut(SERVICE_ID) {
        if !svc.is_empty() {
            *svc = format!("{}{}{}", namespace, QUALIFIER_SEP, svc);
        }
    }
}

/// Toward storage: record the joined workload ids under `key` (empty included) and
/// reduce the service id to its bare form, generating one from the key if missing.
pub fn compact_target(target: &mut Map<String, Value>, key: &str, id_prefix: &str, new_state: &mut StateMap) {
    let workloads = workload_ids(target.get(WORKLOAD_IDS));
    new_state.insert(key.to_string(), join_workloads(&workloads));

    let service_id = match target.get(SERVICE_ID).and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        Some(svc) => strip_qualifier(svc).to_string(),
        None => synthetic_service_id(id_prefix, key).unwrap_or_else(|e| {
            counter!("ingress_synthetic_id_err", 1u64);
            warn!(error = %e, key, "cannot derive service id from state key");
            String::new()
        }),
    };
    target.insert(SERVICE_ID.to_string(), Value::String(service_id));
}

/// `ns:svc` -> `svc`; an unqualified id is returned as is.
pub fn strip_qualifier(id: &str) -> &str {
    match id.split_once(QUALIFIER_SEP) {
        Some((_, rest)) => rest,
        None => id,
    }
}

/// Read `workloadIds`, accepting a list or a lone string. Empty strings are kept so the
/// joined value splits back to the same list; non-string entries are dropped.
pub fn workload_ids(v: Option<&Value>) -> WorkloadIds {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => WorkloadIds::from_elem(s.clone(), 1),
        _ => WorkloadIds::new(),
    }
}

pub fn join_workloads(ids: &[String]) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 { out.push(WORKLOAD_SEP); }
        out.push_str(id);
    }
    out
}

pub fn split_workloads(joined: &str) -> WorkloadIds {
    joined.split(WORKLOAD_SEP).map(str::to_string).collect()
}
