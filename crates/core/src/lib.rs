//! Mooring core types: resource identity, transform direction, state map and config.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

/// Annotation holding the JSON-encoded rule state on every ingress.
pub const STATE_ANNOTATION: &str = "field.cattle.io/ingressState";

/// Prefix of service ids generated for rules that were saved without one.
pub const SYNTHETIC_ID_PREFIX: &str = "ingress-";

/// Separates a namespace from a local name (`ns:svc`, `ns:cert`, `ns:name`).
pub const QUALIFIER_SEP: char = ':';

/// Joins workload ids inside a single state value. Workload ids contain `:` themselves.
pub const WORKLOAD_SEP: char = '/';

/// Persisted rule state: StateKey -> StateValue. Ordered so the encoded JSON is stable.
pub type StateMap = BTreeMap<String, String>;

/// Workload ids backing one rule; almost always one or two entries.
pub type WorkloadIds = SmallVec<[String; 4]>;

/// Which way a document is travelling through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Expand stored state for display: qualify ids, restore workload bindings.
    ToClient,
    /// Compact display data before persisting: strip qualifiers, record bindings.
    ToStorage,
}

/// `namespace:name` identity of one ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    /// Split on the first qualifier. An id without one is a bare name in no namespace.
    pub fn parse(id: &str) -> Self {
        match id.split_once(QUALIFIER_SEP) {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new("", id),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}{}{}", self.namespace, QUALIFIER_SEP, self.name)
        }
    }
}

/// One routing slot: the default backend is `("", "/")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPath {
    pub host: String,
    pub path: String,
}

impl HostPath {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self { host: host.into(), path: path.into() }
    }

    pub fn default_backend() -> Self { Self::new("", "/") }
}

/// Failures at the state encode/decode boundaries. Callers degrade instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state annotation is not a string")]
    NotAString,
    #[error("state annotation is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("state key is not valid base64: {0}")]
    Key(String),
}

/// Codec knobs. `Default` matches what existing deployments have persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Annotation the state map is stored under.
    pub annotation: String,
    /// Prefix for generated service ids.
    pub id_prefix: String,
    /// Wildcard IP domain; rules on this host are keyed as if they had no host.
    pub ip_domain: Option<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            annotation: STATE_ANNOTATION.to_string(),
            id_prefix: SYNTHETIC_ID_PREFIX.to_string(),
            ip_domain: None,
        }
    }
}

impl CodecConfig {
    /// Defaults overridden by `MOORING_STATE_ANNOTATION` and `MOORING_IP_DOMAIN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CodecConfig::from_env`], reading variables through `lookup`.
    /// Values are trimmed; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let mut cfg = Self::default();
        if let Some(a) = var("MOORING_STATE_ANNOTATION") {
            cfg.annotation = a;
        }
        cfg.ip_domain = var("MOORING_IP_DOMAIN");
        cfg
    }
}

pub mod prelude {
    pub use super::{
        CodecConfig, Direction, HostPath, ResourceId, StateError, StateMap, WorkloadIds,
        QUALIFIER_SEP, STATE_ANNOTATION, SYNTHETIC_ID_PREFIX, WORKLOAD_SEP,
    };
}
