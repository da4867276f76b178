// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named messages carried by a portal stack.
//!
//! The TLV encoding of these messages belongs to the codec layer; here a
//! message is only its kind, its name and an opaque payload.

use crate::name::Name;
use std::fmt;

/// Kind of a portal message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Request for named content.
    Interest,
    /// Named content (response to an Interest).
    ContentObject,
    /// Control traffic exchanged with the forwarder.
    Control,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MessageKind::Interest => "Interest",
            MessageKind::ContentObject => "ContentObject",
            MessageKind::Control => "Control",
        };
        write!(f, "{}", label)
    }
}

/// A named message exchanged through a portal stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortalMessage {
    kind: MessageKind,
    name: Name,
    payload: Vec<u8>,
}

impl PortalMessage {
    /// Create a message of the given kind.
    pub fn new(kind: MessageKind, name: Name, payload: Vec<u8>) -> Self {
        Self {
            kind,
            name,
            payload,
        }
    }

    /// Interest for `name` with an empty payload.
    pub fn interest(name: Name) -> Self {
        Self::new(MessageKind::Interest, name, Vec::new())
    }

    /// Content object for `name` carrying `payload`.
    pub fn content(name: Name, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageKind::ContentObject, name, payload.into())
    }

    /// Control message for `name` carrying `payload`.
    pub fn control(name: Name, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageKind::Control, name, payload.into())
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the message, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// True when the message name falls under `prefix`.
    pub fn matches(&self, prefix: &Name) -> bool {
        self.name.starts_with(prefix)
    }
}

impl fmt::Display for PortalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} bytes)", self.kind, self.name, self.payload.len())
    }
}
