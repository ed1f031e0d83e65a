use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::device::Device;
use crate::namespace::{CreatePolicy, Namespace};
use crate::protocol::Header;
use crate::types::{Channel, EntityId};
use crate::{Error, Result};

/// Parser for namespaces whose payload is not a flat per-channel list.
pub type CustomParser = fn(&mut Device, &Header, &Value) -> Result<()>;

#[derive(Clone)]
pub enum HandlerKind {
    /// Items are routed to the entities registered for their `channel`.
    Channel(BTreeMap<Channel, Vec<EntityId>>),
    Custom(CustomParser),
}

impl fmt::Debug for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Channel(entities) => f.debug_tuple("Channel").field(entities).finish(),
            HandlerKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceHandler {
    pub namespace: Namespace,
    pub policy: CreatePolicy,
    pub kind: HandlerKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<EntityId>),
    NotFound(CreatePolicy),
}

/// Namespace -> handler table for a single device.
#[derive(Debug, Default)]
pub struct Dispatcher {
    ability: BTreeSet<Namespace>,
    handlers: BTreeMap<Namespace, NamespaceHandler>,
}

impl Dispatcher {
    pub fn new(ability: BTreeSet<Namespace>) -> Self {
        Self {
            ability,
            handlers: BTreeMap::new(),
        }
    }

    pub fn supports(&self, namespace: Namespace) -> bool {
        self.ability.contains(&namespace)
    }

    pub fn handler(&self, namespace: Namespace) -> Option<&NamespaceHandler> {
        self.handlers.get(&namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = Namespace> + '_ {
        self.handlers.keys().copied()
    }

    /// Registers `id` for `namespace`, keyed by its channel.
    ///
    /// Returns false (and does nothing) when the device does not advertise
    /// the namespace or the entity has no channel.
    pub fn register(&mut self, namespace: Namespace, id: &EntityId) -> bool {
        if !self.supports(namespace) {
            debug!(%namespace, entity = %id, "namespace not in ability, skipping registration");
            return false;
        }
        let Some(channel) = id.get_channel() else {
            debug!(%namespace, entity = %id, "entity has no channel, skipping registration");
            return false;
        };
        let handler = self
            .handlers
            .entry(namespace)
            .or_insert_with(|| NamespaceHandler {
                namespace,
                policy: namespace.create_policy(),
                kind: HandlerKind::Channel(BTreeMap::new()),
            });
        match &mut handler.kind {
            HandlerKind::Channel(entities) => {
                let ids = entities.entry(channel.clone()).or_default();
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
                true
            }
            HandlerKind::Custom(_) => {
                debug!(%namespace, entity = %id, "namespace has a custom parser");
                false
            }
        }
    }

    pub fn register_parser(&mut self, namespace: Namespace, parser: CustomParser) -> bool {
        if !self.supports(namespace) {
            debug!(%namespace, "namespace not in ability, skipping parser");
            return false;
        }
        self.handlers.insert(
            namespace,
            NamespaceHandler {
                namespace,
                policy: namespace.create_policy(),
                kind: HandlerKind::Custom(parser),
            },
        );
        true
    }

    /// Idempotent.
    pub fn unregister(&mut self, namespace: Namespace, id: &EntityId) {
        let Some(handler) = self.handlers.get_mut(&namespace) else {
            return;
        };
        if let HandlerKind::Channel(entities) = &mut handler.kind
            && let Some(channel) = id.get_channel()
            && let Some(ids) = entities.get_mut(channel)
        {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                entities.remove(channel);
            }
        }
    }

    pub fn lookup(&self, namespace: Namespace, channel: &Channel) -> Lookup {
        let handler = self.handlers.get(&namespace);
        let policy = handler.map_or_else(|| namespace.create_policy(), |h| h.policy);
        match handler.map(|h| &h.kind) {
            Some(HandlerKind::Channel(entities)) => match entities.get(channel) {
                Some(ids) if !ids.is_empty() => Lookup::Found(ids.clone()),
                _ => Lookup::NotFound(policy),
            },
            _ => Lookup::NotFound(policy),
        }
    }
}

/// Splits a namespace payload into per-channel items.
pub fn payload_items<'a>(
    namespace: Namespace,
    payload: &'a Value,
) -> Result<Vec<(Option<Channel>, &'a Value)>> {
    match payload.get(namespace.key()) {
        Some(data) => split_items(namespace, data),
        None => Err(Error::payload(
            namespace,
            format!("missing key '{}'", namespace.key()),
        )),
    }
}

/// A single object without `channel` is channel 0; list items without a
/// usable `channel` come back as `None` so the caller can skip them.
pub fn split_items(namespace: Namespace, data: &Value) -> Result<Vec<(Option<Channel>, &Value)>> {
    match data {
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| (item.get("channel").and_then(Channel::from_value), item))
            .collect()),
        Value::Object(_) => {
            let channel = match data.get("channel") {
                Some(v) => Channel::from_value(v),
                None => Some(Channel::Int(0)),
            };
            Ok(vec![(channel, data)])
        }
        _ => Err(Error::payload(namespace, "unexpected payload shape")),
    }
}
