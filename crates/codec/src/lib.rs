//! Mooring rule state codec.
//!
//! Ingress documents travel in two shapes. The client sees namespace-qualified service
//! and certificate ids plus the workload ids that back each rule; storage keeps bare ids
//! and a compact state map in an annotation from which the client shape is rebuilt.
//! [`Codec::transform`] converts a document in place in either direction.

#![forbid(unsafe_code)]

use metrics::counter;
use mooring_core::{CodecConfig, Direction, HostPath, ResourceId, StateMap};
use serde_json::{Map, Value};
use tracing::{debug, error};

pub mod certs;
pub mod key;
pub mod paths;
pub mod rule;
pub mod state;

pub use key::{cert_key, rule_key, synthetic_service_id};

/// Rule state codec bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    cfg: CodecConfig,
}

impl Codec {
    pub fn new(cfg: CodecConfig) -> Self { Self { cfg } }

    pub fn config(&self) -> &CodecConfig { &self.cfg }

    /// Rewrite `doc` for `direction`. `id` is the `namespace:name` of the ingress.
    ///
    /// Never fails: malformed rules, keys or state degrade field by field.
    pub fn transform(&self, id: &str, doc: &mut Value, direction: Direction) {
        counter!("ingress_transform_total", 1u64);
        let rid = ResourceId::parse(id);
        let namespace = doc
            .get("namespaceId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(rid.namespace.as_str())
            .to_string();

        let old = match direction {
            Direction::ToClient => self.load_state(id, doc),
            Direction::ToStorage => StateMap::new(),
        };
        let mut new_state = StateMap::new();
        let mut slots = 0usize;

        paths::for_each_target(doc, |slot, target| {
            slots += 1;
            let key = self.slot_key(&rid, slot, target);
            match direction {
                Direction::ToClient => rule::expand_target(target, &key, &namespace, &old),
                Direction::ToStorage => rule::compact_target(target, &key, &self.cfg.id_prefix, &mut new_state),
            }
        });

        match direction {
            Direction::ToClient => certs::expand_certs(doc, &old),
            Direction::ToStorage => {
                certs::compact_certs(doc, &mut new_state);
                self.save_state(id, doc, &new_state);
            }
        }
        debug!(id, ?direction, slots, entries = new_state.len(), "ingress state transformed");
    }

    /// StateKey of one rule slot, honouring the wildcard IP domain.
    pub fn slot_key(&self, id: &ResourceId, slot: &HostPath, target: &Map<String, Value>) -> String {
        let host = match self.cfg.ip_domain.as_deref() {
            Some(domain) if domain == slot.host => "",
            _ => slot.host.as_str(),
        };
        let port = key::port_string(target.get(rule::TARGET_PORT));
        key::rule_key(id, host, &slot.path, &port)
    }

    fn load_state(&self, id: &str, doc: &Value) -> StateMap {
        state::decode_state(doc, &self.cfg.annotation).unwrap_or_else(|e| {
            counter!("ingress_state_parse_err", 1u64);
            debug!(id, error = %e, "ignoring unreadable ingress state");
            StateMap::new()
        })
    }

    fn save_state(&self, id: &str, doc: &mut Value, new_state: &StateMap) {
        match state::encode_state(new_state) {
            Ok(encoded) => state::put_state(doc, &self.cfg.annotation, encoded),
            Err(e) => {
                counter!("ingress_state_marshal_err", 1u64);
                error!(id, error = %e, "failed to save state on ingress");
            }
        }
    }
}

/// [`Codec::transform`] with the default configuration.
pub fn transform(id: &str, doc: &mut Value, direction: Direction) {
    Codec::default().transform(id, doc, direction)
}
