#![forbid(unsafe_code)]

use mooring_codec::{cert_key, rule_key, transform};
use mooring_core::{Direction, ResourceId, STATE_ANNOTATION};
use serde_json::{json, Value};

fn client_doc() -> Value {
    json!({
        "id": "ns1:web",
        "name": "web",
        "namespaceId": "ns1",
        "defaultBackend": { "serviceId": "ns1:fallback", "targetPort": 8080 },
        "rules": [
            {
                "host": "a.com",
                "paths": {
                    "/x": { "workloadIds": ["deployment:ns1:api", "statefulset:ns1:db"], "targetPort": 80 },
                    "/y": { "serviceId": "ns1:static", "targetPort": 80 }
                }
            },
            {
                "host": "b.com",
                "paths": { "/": { "workloadIds": ["daemonset:ns1:edge"], "targetPort": "http" } }
            }
        ],
        "tls": [ { "certificateId": "ns1:certA", "hosts": ["a.com"] } ],
        "annotations": { "team": "edge" }
    })
}

fn state_of(doc: &Value) -> serde_json::Map<String, Value> {
    let raw = doc["annotations"][STATE_ANNOTATION].as_str().expect("state annotation");
    serde_json::from_str(raw).expect("state json")
}

/// Drop client-only fields the way a real store would not keep them.
fn persisted(mut doc: Value) -> Value {
    for rule in doc["rules"].as_array_mut().into_iter().flatten() {
        for (_, target) in rule["paths"].as_object_mut().into_iter().flatten() {
            if let Some(t) = target.as_object_mut() {
                t.remove("workloadIds");
            }
        }
    }
    doc
}

#[test]
fn storage_then_client_restores_bindings() {
    let mut doc = client_doc();
    transform("ns1:web", &mut doc, Direction::ToStorage);

    // Storage form: bare ids everywhere, generated ids for workload-backed rules.
    assert_eq!(doc["defaultBackend"]["serviceId"], json!("fallback"));
    assert_eq!(doc["rules"][0]["paths"]["/y"]["serviceId"], json!("static"));
    let generated = doc["rules"][0]["paths"]["/x"]["serviceId"].as_str().unwrap().to_string();
    assert!(generated.starts_with("ingress-"));
    assert_eq!(doc["tls"][0]["certificateId"], json!("certA"));
    assert_eq!(doc["annotations"]["team"], json!("edge"));

    let id = ResourceId::new("ns1", "web");
    let state = state_of(&doc);
    assert_eq!(state.len(), 5);
    assert_eq!(state[&rule_key(&id, "a.com", "/x", "80")], json!("deployment:ns1:api/statefulset:ns1:db"));
    assert_eq!(state[&rule_key(&id, "a.com", "/y", "80")], json!(""));
    assert_eq!(state[&rule_key(&id, "", "/", "8080")], json!(""));
    assert_eq!(state[&rule_key(&id, "b.com", "/", "http")], json!("daemonset:ns1:edge"));
    assert_eq!(state[&cert_key("certA")], json!("ns1:certA"));

    let mut doc = persisted(doc);
    transform("ns1:web", &mut doc, Direction::ToClient);

    let x = &doc["rules"][0]["paths"]["/x"];
    assert_eq!(x["workloadIds"], json!(["deployment:ns1:api", "statefulset:ns1:db"]));
    assert!(x.get("serviceId").is_none());
    assert_eq!(doc["rules"][1]["paths"]["/"]["workloadIds"], json!(["daemonset:ns1:edge"]));
    assert_eq!(doc["rules"][0]["paths"]["/y"]["serviceId"], json!("ns1:static"));
    assert!(doc["rules"][0]["paths"]["/y"].get("workloadIds").is_none());
    assert_eq!(doc["defaultBackend"]["serviceId"], json!("ns1:fallback"));
    assert_eq!(doc["tls"][0]["certificateId"], json!("ns1:certA"));
}

#[test]
fn client_view_is_stable_across_save_cycles() {
    let mut first = client_doc();
    transform("ns1:web", &mut first, Direction::ToStorage);
    let mut first = persisted(first);
    transform("ns1:web", &mut first, Direction::ToClient);

    let mut second = first.clone();
    transform("ns1:web", &mut second, Direction::ToStorage);
    let stored_again = persisted(second.clone());

    let mut stored_once = client_doc();
    transform("ns1:web", &mut stored_once, Direction::ToStorage);
    assert_eq!(stored_again, persisted(stored_once));

    let mut second = stored_again;
    transform("ns1:web", &mut second, Direction::ToClient);
    assert_eq!(first, second);
}

#[test]
fn certificate_round_trip() {
    let mut doc = json!({ "namespaceId": "ns1", "tls": [{ "certificateId": "ns1:certA" }] });
    transform("ns1:web", &mut doc, Direction::ToStorage);
    assert_eq!(doc["tls"][0]["certificateId"], json!("certA"));
    assert_eq!(state_of(&doc)["Y2VydEE="], json!("ns1:certA"));

    transform("ns1:web", &mut doc, Direction::ToClient);
    assert_eq!(doc["tls"][0]["certificateId"], json!("ns1:certA"));
}

#[test]
fn malformed_certificate_is_left_alone() {
    let mut doc = json!({ "namespaceId": "ns1", "tls": [{ "certificateId": "certA" }] });
    transform("ns1:web", &mut doc, Direction::ToStorage);
    assert_eq!(doc["tls"][0]["certificateId"], json!("certA"));
    assert!(state_of(&doc).is_empty());
}

#[test]
fn empty_resource_persists_empty_object() {
    let mut doc = json!({ "name": "web", "namespaceId": "ns1", "rules": [], "defaultBackend": null });
    transform("ns1:web", &mut doc, Direction::ToStorage);
    assert_eq!(doc["annotations"][STATE_ANNOTATION], json!("{}"));
    assert_eq!(doc["rules"], json!([]));
}

#[test]
fn service_id_qualify_then_compact() {
    let mut doc = json!({
        "namespaceId": "ns1",
        "rules": [{ "host": "a.com", "paths": { "/x": { "serviceId": "svc", "targetPort": 80 } } }]
    });
    transform("ns1:web", &mut doc, Direction::ToClient);
    assert_eq!(doc["rules"][0]["paths"]["/x"]["serviceId"], json!("ns1:svc"));
    transform("ns1:web", &mut doc, Direction::ToStorage);
    assert_eq!(doc["rules"][0]["paths"]["/x"]["serviceId"], json!("svc"));
}

#[test]
fn qualified_service_id_survives_repeated_saves() {
    let mut doc = json!({
        "namespaceId": "ns1",
        "rules": [{ "host": "a.com", "paths": { "/x": { "serviceId": "ns1:a:b", "targetPort": 80 } } }]
    });
    transform("ns1:web", &mut doc, Direction::ToStorage);
    assert_eq!(doc["rules"][0]["paths"]["/x"]["serviceId"], json!("a:b"));

    for _ in 0..3 {
        transform("ns1:web", &mut doc, Direction::ToClient);
        assert_eq!(doc["rules"][0]["paths"]["/x"]["serviceId"], json!("ns1:a:b"));
        transform("ns1:web", &mut doc, Direction::ToStorage);
        assert_eq!(doc["rules"][0]["paths"]["/x"]["serviceId"], json!("a:b"));
    }
}

fn duplicated_slot(second_port: u16) -> Value {
    json!({
        "namespaceId": "ns1",
        "rules": [
            { "host": "a.com", "paths": { "/x": { "workloadIds": ["deployment:ns1:a"], "targetPort": 80 } } },
            { "host": "a.com", "paths": { "/x": { "workloadIds": ["deployment:ns1:b"], "targetPort": second_port } } }
        ]
    })
}

#[test]
fn duplicate_slot_on_same_port_shares_one_entry() {
    let id = ResourceId::new("ns1", "web");
    let mut doc = duplicated_slot(80);
    transform("ns1:web", &mut doc, Direction::ToStorage);

    // Both targets are rewritten, with the same generated id.
    let first = &doc["rules"][0]["paths"]["/x"]["serviceId"];
    assert_eq!(first, &json!("ingress-5ed94150c81e63f019bfdb628a0bb677"));
    assert_eq!(&doc["rules"][1]["paths"]["/x"]["serviceId"], first);

    // One key; the later rule's bindings win.
    let state = state_of(&doc);
    assert_eq!(state.len(), 1);
    assert_eq!(state[&rule_key(&id, "a.com", "/x", "80")], json!("deployment:ns1:b"));

    let mut doc = persisted(doc);
    transform("ns1:web", &mut doc, Direction::ToClient);
    assert_eq!(doc["rules"][0]["paths"]["/x"]["workloadIds"], json!(["deployment:ns1:b"]));
    assert_eq!(doc["rules"][1]["paths"]["/x"]["workloadIds"], json!(["deployment:ns1:b"]));
}

#[test]
fn duplicate_slot_on_different_ports_keeps_both_entries() {
    let id = ResourceId::new("ns1", "web");
    let mut doc = duplicated_slot(81);
    transform("ns1:web", &mut doc, Direction::ToStorage);

    let a = doc["rules"][0]["paths"]["/x"]["serviceId"].as_str().unwrap().to_string();
    let b = doc["rules"][1]["paths"]["/x"]["serviceId"].as_str().unwrap().to_string();
    assert!(a.starts_with("ingress-") && b.starts_with("ingress-"));
    assert_ne!(a, b);

    let state = state_of(&doc);
    assert_eq!(state.len(), 2);
    assert_eq!(state[&rule_key(&id, "a.com", "/x", "80")], json!("deployment:ns1:a"));
    assert_eq!(state[&rule_key(&id, "a.com", "/x", "81")], json!("deployment:ns1:b"));

    let mut doc = persisted(doc);
    transform("ns1:web", &mut doc, Direction::ToClient);
    assert_eq!(doc["rules"][0]["paths"]["/x"]["workloadIds"], json!(["deployment:ns1:a"]));
    assert_eq!(doc["rules"][1]["paths"]["/x"]["workloadIds"], json!(["deployment:ns1:b"]));
}
