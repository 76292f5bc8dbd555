//! Mooring store: runs the rule state codec around create/update/read of ingresses.

#![forbid(unsafe_code)]

use std::sync::Mutex;

use metrics::counter;
use mooring_codec::Codec;
use mooring_core::{Direction, ResourceId};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info};

/// Store errors, shaped for transport to API clients.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store for ingress documents in storage form.
pub trait ResourceStore: Send + Sync {
    fn create(&self, doc: Value) -> StoreResult<Value>;
    fn update(&self, id: &str, doc: Value) -> StoreResult<Value>;
    fn by_id(&self, id: &str) -> StoreResult<Option<Value>>;
    /// All documents, optionally restricted to one namespace.
    fn list(&self, namespace: Option<&str>) -> StoreResult<Vec<Value>>;
}

fn str_field<'a>(doc: &'a Value, field: &str) -> &'a str {
    doc.get(field).and_then(|v| v.as_str()).unwrap_or("")
}

/// Identity of a document about to be created: `namespaceId:name`.
pub fn doc_id(doc: &Value) -> StoreResult<String> {
    let name = str_field(doc, "name");
    if name.is_empty() {
        return Err(StoreError::Validation("ingress name is required".into()));
    }
    Ok(ResourceId::new(str_field(doc, "namespaceId"), name).to_string())
}

/// Compacts documents on the way in and expands them on the way out.
pub struct IngressStore<S> {
    inner: S,
    codec: Codec,
}

impl<S: ResourceStore> IngressStore<S> {
    pub fn new(inner: S) -> Self { Self::with_codec(inner, Codec::default()) }

    pub fn with_codec(inner: S, codec: Codec) -> Self { Self { inner, codec } }

    pub fn inner(&self) -> &S { &self.inner }

    pub fn create(&self, mut doc: Value) -> StoreResult<Value> {
        let id = doc_id(&doc)?;
        self.codec.transform(&id, &mut doc, Direction::ToStorage);
        let stored = self.inner.create(doc)?;
        info!(id = %id, "ingress created");
        Ok(self.expand(stored))
    }

    pub fn update(&self, id: &str, mut doc: Value) -> StoreResult<Value> {
        self.codec.transform(id, &mut doc, Direction::ToStorage);
        let stored = self.inner.update(id, doc)?;
        debug!(id, "ingress updated");
        Ok(self.expand(stored))
    }

    pub fn by_id(&self, id: &str) -> StoreResult<Option<Value>> {
        Ok(self.inner.by_id(id)?.map(|doc| self.expand(doc)))
    }

    pub fn list(&self, namespace: Option<&str>) -> StoreResult<Vec<Value>> {
        let docs = self.inner.list(namespace)?;
        Ok(docs.into_iter().map(|doc| self.expand(doc)).collect())
    }

    /// Client view of a stored document, keyed by the document's own `id`.
    fn expand(&self, mut doc: Value) -> Value {
        let id = str_field(&doc, "id").to_string();
        self.codec.transform(&id, &mut doc, Direction::ToClient);
        doc
    }
}

/// In-RAM store keyed by `namespace:name`.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<FxHashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.lock().map(|d| d.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Raw stored form, bypassing any codec.
    pub fn raw(&self, id: &str) -> Option<Value> {
        self.lock().ok().and_then(|d| d.get(id).cloned())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, FxHashMap<String, Value>>> {
        self.docs.lock().map_err(|_| StoreError::Internal("memory store lock poisoned".into()))
    }
}

impl ResourceStore for MemoryStore {
    fn create(&self, mut doc: Value) -> StoreResult<Value> {
        let id = doc_id(&doc)?;
        let mut docs = self.lock()?;
        if docs.contains_key(&id) {
            counter!("store_conflict_total", 1u64);
            return Err(StoreError::Conflict(format!("ingress {} already exists", id)));
        }
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".into(), Value::String(id.clone()));
        }
        docs.insert(id, doc.clone());
        Ok(doc)
    }

    fn update(&self, id: &str, mut doc: Value) -> StoreResult<Value> {
        let mut docs = self.lock()?;
        let Some(slot) = docs.get_mut(id) else {
            return Err(StoreError::NotFound(format!("ingress {}", id)));
        };
        let rid = ResourceId::parse(id);
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".into(), Value::String(id.to_string()));
            obj.insert("name".into(), Value::String(rid.name));
            obj.insert("namespaceId".into(), Value::String(rid.namespace));
        }
        *slot = doc.clone();
        Ok(doc)
    }

    fn by_id(&self, id: &str) -> StoreResult<Option<Value>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn list(&self, namespace: Option<&str>) -> StoreResult<Vec<Value>> {
        let docs = self.lock()?;
        let mut out: Vec<(&String, &Value)> = docs
            .iter()
            .filter(|(_, d)| namespace.map(|ns| str_field(d, "namespaceId") == ns).unwrap_or(true))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        Ok(out.into_iter().map(|(_, d)| d.clone()).collect())
    }
}
