// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CCNx Portal Stack
//!
//! Transport abstraction between application code and a local CCNx
//! forwarder. Applications exchange named messages through a
//! [`PortalStack`] without depending on the concrete transport behind it.
//!
//! # Features
//!
//! - **Uniform handle**: start/stop, send/receive with timeout, listen/ignore
//! - **Pluggable backends**: anything implementing [`PortalBackend`]
//! - **Event loop integration**: `file_id()` exports a pollable descriptor
//! - **Routing anchors**: ordered, hashable {prefix, expiration} values with
//!   binary and JSON forms
//!
//! # Quick Start
//!
//! ```
//! use ccnx_portal::backend::LoopbackHub;
//! use ccnx_portal::{Name, PortalAttributes, PortalFactory, PortalMessage, StackTimeout};
//!
//! let hub = LoopbackHub::new();
//! let factory = PortalFactory::default();
//! let producer = factory.loopback_stack(&hub, PortalAttributes::default()).unwrap();
//! let consumer = factory.loopback_stack(&hub, PortalAttributes::default()).unwrap();
//!
//! let prefix: Name = "ccnx:/demo".parse().unwrap();
//! consumer.listen(&prefix, StackTimeout::Never).unwrap();
//!
//! producer.start().unwrap();
//! let msg = PortalMessage::content(prefix.child("hello").unwrap(), b"world".to_vec());
//! producer.send(&msg, StackTimeout::from_millis(100)).unwrap();
//!
//! assert_eq!(consumer.receive(StackTimeout::Immediate).unwrap(), Some(msg));
//! ```
//!
//! # Timeouts
//!
//! [`StackTimeout`] keeps the signed microsecond encoding: negative blocks
//! forever, zero polls, positive bounds the wait.

pub mod anchor;
pub mod attributes;
pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod message;
pub mod name;
pub mod stack;
pub mod timeout;

pub use anchor::{AnchorError, PortalAnchor};
pub use attributes::PortalAttributes;
pub use backend::{BoxedPortalBackend, PortalBackend};
pub use config::{ConfigError, PortalConfig};
pub use error::{PortalError, Result};
pub use factory::{KeyId, PortalFactory};
pub use message::{MessageKind, PortalMessage};
pub use name::{Name, NameError};
pub use stack::PortalStack;
pub use timeout::{Deadline, StackTimeout};
