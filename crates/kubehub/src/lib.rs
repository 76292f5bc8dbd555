//! Mooring kubehub: fetch Ingress objects and shape them as storage-form documents.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use kube::{
    api::{Api, ListParams},
    Client,
};
use mooring_core::ResourceId;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client from default config")
}

pub async fn fetch_ingress(client: Client, namespace: &str, name: &str) -> Result<Ingress> {
    let api: Api<Ingress> = Api::namespaced(client, namespace);
    let ing = api
        .get(name)
        .await
        .with_context(|| format!("fetching ingress {}/{}", namespace, name))?;
    debug!(ns = %namespace, name = %name, "ingress fetched");
    Ok(ing)
}

/// List ingresses in `namespace`, or across the cluster when `None`.
pub async fn list_ingresses(client: Client, namespace: Option<&str>) -> Result<Vec<Ingress>> {
    let api: Api<Ingress> = match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    let list = api.list(&ListParams::default()).await.context("listing ingresses")?;
    info!(ns = ?namespace, count = list.items.len(), "ingresses listed");
    Ok(list.items)
}

/// Service backend as a target record; `None` for resource backends.
fn backend_to_target(b: &IngressBackend) -> Option<Value> {
    let svc = b.service.as_ref()?;
    let mut target = Map::new();
    target.insert("serviceId".into(), Value::String(svc.name.clone()));
    if let Some(port) = &svc.port {
        if let Some(n) = port.number {
            target.insert("targetPort".into(), json!(n));
        } else if let Some(name) = port.name.as_ref().filter(|s| !s.is_empty()) {
            target.insert("targetPort".into(), Value::String(name.clone()));
        }
    }
    Some(Value::Object(target))
}

/// Storage-form document for an Ingress: bare service and secret names, rule paths
/// keyed by path, and the object's annotations (state included).
pub fn ingress_to_doc(ing: &Ingress) -> Value {
    let name = ing.metadata.name.clone().unwrap_or_default();
    let namespace = ing.metadata.namespace.clone().unwrap_or_default();
    let mut doc = Map::new();
    doc.insert("id".into(), Value::String(ResourceId::new(namespace.as_str(), name.as_str()).to_string()));
    doc.insert("name".into(), Value::String(name));
    doc.insert("namespaceId".into(), Value::String(namespace));

    let annotations: Map<String, Value> = ing
        .metadata
        .annotations
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    doc.insert("annotations".into(), Value::Object(annotations));

    let Some(spec) = ing.spec.as_ref() else { return Value::Object(doc) };

    if let Some(target) = spec.default_backend.as_ref().and_then(backend_to_target) {
        doc.insert("defaultBackend".into(), target);
    }

    let mut rules = Vec::new();
    for rule in spec.rules.iter().flatten() {
        let mut paths = Map::new();
        for p in rule.http.iter().flat_map(|h| h.paths.iter()) {
            let path = p.path.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "/".to_string());
            match backend_to_target(&p.backend) {
                Some(target) => { paths.insert(path, target); }
                None => debug!(path = %path, "skipping non-service backend"),
            }
        }
        rules.push(json!({
            "host": rule.host.clone().unwrap_or_default(),
            "paths": paths,
        }));
    }
    doc.insert("rules".into(), Value::Array(rules));

    let tls: Vec<Value> = spec
        .tls
        .iter()
        .flatten()
        .map(|t| json!({
            "certificateId": t.secret_name.clone().unwrap_or_default(),
            "hosts": t.hosts.clone().unwrap_or_default(),
        }))
        .collect();
    if !tls.is_empty() {
        doc.insert("tls".into(), Value::Array(tls));
    }

    Value::Object(doc)
}
