//! Walks the routing slots of an ingress document.

use mooring_core::HostPath;
use serde_json::{Map, Value};

/// Visit every target record in order: the default backend first (as `("", "/")`),
/// then each `rules[*].paths[path]` entry keyed by the rule's host.
///
/// Anything that is not shaped like a rule list is skipped rather than rejected:
/// a missing `rules`, a rule without `paths`, or a non-object target yields nothing.
pub fn for_each_target<F>(doc: &mut Value, mut visit: F)
where
    F: FnMut(&HostPath, &mut Map<String, Value>),
{
    let Some(obj) = doc.as_object_mut() else { return };

    if let Some(Value::Object(target)) = obj.get_mut("defaultBackend") {
        visit(&HostPath::default_backend(), target);
    }

    let Some(Value::Array(rules)) = obj.get_mut("rules") else { return };
    for rule in rules.iter_mut() {
        let Value::Object(rule) = rule else { continue };
        let host = rule.get("host").and_then(|h| h.as_str()).unwrap_or("").to_string();
        let Some(Value::Object(paths)) = rule.get_mut("paths") else { continue };
        for (path, target) in paths.iter_mut() {
            if let Value::Object(target) = target {
                visit(&HostPath::new(host.as_str(), path.as_str()), target);
            }
        }
    }
}
