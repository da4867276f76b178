// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portal factory: key identity, property set and stack construction.
//!
//! A factory is configured once and shared. Every stack it creates holds a
//! clone of the factory handle, so the factory outlives all of its stacks.

use crate::attributes::PortalAttributes;
use crate::backend::{LoopbackHub, PortalBackend};
use crate::config::PortalConfig;
use crate::error::Result;
use crate::stack::PortalStack;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Property naming the local router.
pub const PROPERTY_LOCAL_ROUTER_NAME: &str = "/localstack/portalFactory/LocalRouterName";
/// Property naming the local forwarder address.
pub const PROPERTY_LOCAL_FORWARDER: &str = "/localstack/portalFactory/LocalForwarder";
/// Property holding the router connection timeout (microseconds).
pub const PROPERTY_LOCAL_ROUTER_TIMEOUT: &str = "/localstack/portalFactory/LocalRouterTimeout";

/// Default router name.
pub const DEFAULT_LOCAL_ROUTER_NAME: &str = "lci:/local/forwarder";
/// Default forwarder address.
pub const DEFAULT_LOCAL_FORWARDER: &str = "tcp://127.0.0.1:9695";
/// Default router timeout in microseconds.
pub const DEFAULT_LOCAL_ROUTER_TIMEOUT: &str = "1000000";

/// Identifier of the key a factory signs with.
///
/// Only the identifier travels with the factory; key material is managed
/// elsewhere.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex string (whitespace and `:` separators allowed).
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits: String = text
            .chars()
            .filter(|c| !c.is_ascii_whitespace() && *c != ':')
            .collect();
        hex::decode(digits).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

struct FactoryInner {
    key_id: KeyId,
    properties: BTreeMap<String, String>,
}

/// Shared, immutable portal factory.
///
/// Cloning is cheap and yields another reference to the same factory;
/// [`reference_count`](Self::reference_count) reports how many are alive.
#[derive(Clone)]
pub struct PortalFactory {
    inner: Arc<FactoryInner>,
}

impl Default for PortalFactory {
    fn default() -> Self {
        Self::new(KeyId::default(), BTreeMap::new())
    }
}

impl PortalFactory {
    /// Create a factory; well-known properties missing from `properties` get
    /// their defaults.
    pub fn new(key_id: KeyId, mut properties: BTreeMap<String, String>) -> Self {
        for (name, value) in [
            (PROPERTY_LOCAL_ROUTER_NAME, DEFAULT_LOCAL_ROUTER_NAME),
            (PROPERTY_LOCAL_FORWARDER, DEFAULT_LOCAL_FORWARDER),
            (PROPERTY_LOCAL_ROUTER_TIMEOUT, DEFAULT_LOCAL_ROUTER_TIMEOUT),
        ] {
            properties
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }

        log::debug!(
            "[portal] factory created key_id={} properties={}",
            key_id,
            properties.len()
        );

        Self {
            inner: Arc::new(FactoryInner { key_id, properties }),
        }
    }

    /// Build a factory from the `[factory]` section of a configuration.
    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(config.factory.key_id(), config.factory.properties.clone())
    }

    pub fn key_id(&self) -> &KeyId {
        &self.inner.key_id
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.inner.properties
    }

    /// Value of property `name`, or `default` when unset.
    pub fn property<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.inner
            .properties
            .get(name)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Bind `backend` into a new stack holding a reference to this factory.
    pub fn create_stack<B>(&self, backend: B) -> PortalStack
    where
        B: PortalBackend + 'static,
    {
        PortalStack::new(self.clone(), Box::new(backend))
    }

    /// Connect a new endpoint to `hub` and bind it into a stack.
    pub fn loopback_stack(
        &self,
        hub: &LoopbackHub,
        attributes: PortalAttributes,
    ) -> Result<PortalStack> {
        Ok(self.create_stack(hub.connect(attributes)?))
    }

    /// Number of live references (this handle, clones and stacks).
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for PortalFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalFactory")
            .field("key_id", &self.inner.key_id.to_string())
            .field("properties", &self.inner.properties)
            .finish()
    }
}
