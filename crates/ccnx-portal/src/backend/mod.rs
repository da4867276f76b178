// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Backend capability surface.
//!
//! A backend is a concrete transport bound into a
//! [`PortalStack`](crate::PortalStack) at construction. It implements every
//! capability of [`PortalBackend`]; the stack only dispatches. Backend state
//! is released by the backend's own `Drop`, which runs exactly once when the
//! last stack handle goes away.
//!
//! # Modules
//!
//! - `event` - eventfd readiness descriptor for external event loops
//! - `loopback` - in-process forwarder and endpoints (test harness transport)
//!
//! # Example
//!
//! ```
//! use ccnx_portal::backend::LoopbackHub;
//! use ccnx_portal::{PortalAttributes, PortalFactory, StackTimeout};
//!
//! let hub = LoopbackHub::new();
//! let factory = PortalFactory::default();
//! let stack = factory.create_stack(hub.connect(PortalAttributes::default()).unwrap());
//!
//! stack.start().unwrap();
//! assert!(stack.receive(StackTimeout::Immediate).unwrap().is_none());
//! ```

/// eventfd readiness descriptor.
pub mod event;
/// In-process loopback forwarder and endpoint backend.
pub mod loopback;

pub use event::{poll_readable, ReadinessEvent};
pub use loopback::{LoopbackBackend, LoopbackHub, MAX_QUEUE_DEPTH};

use crate::attributes::PortalAttributes;
use crate::error::Result;
use crate::message::PortalMessage;
use crate::name::Name;
use crate::timeout::StackTimeout;
use std::os::fd::RawFd;

/// Capabilities every portal backend provides.
///
/// Methods take `&self`: backends guard their own mutable state, so a stack
/// handle can be shared between a receiving thread and a sending thread.
///
/// # Implementation Notes
///
/// - `receive`, `send`, `listen` and `ignore` are the only methods allowed to
///   block, and never longer than their [`StackTimeout`]
/// - `receive` returns `Ok(None)` when the timeout elapses; that is not an error
/// - `file_id` must poll readable whenever `receive(Immediate)` would yield
/// - failures carry their POSIX code via [`PortalError::error_code`](crate::PortalError::error_code)
pub trait PortalBackend: Send + Sync {
    /// Short backend name for log records.
    fn kind(&self) -> &'static str;

    /// Begin operating (connect to the forwarder, arm queues, ...).
    fn start(&self) -> Result<()>;

    /// Stop operating.
    fn stop(&self) -> Result<()>;

    /// Next inbound message, or `None` when `timeout` elapses first.
    fn receive(&self, timeout: StackTimeout) -> Result<Option<PortalMessage>>;

    /// Hand `message` to the transport, waiting at most `timeout` for room.
    fn send(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<()>;

    /// Start delivering inbound messages under `name`.
    fn listen(&self, name: &Name, timeout: StackTimeout) -> Result<()>;

    /// Stop delivering inbound messages under `name`.
    fn ignore(&self, name: &Name, timeout: StackTimeout) -> Result<()>;

    /// Descriptor suitable for `poll(2)`/`select(2)`.
    fn file_id(&self) -> RawFd;

    /// Replace the backend attributes (may be rejected).
    fn set_attributes(&self, attributes: &PortalAttributes) -> Result<()>;

    /// Current backend attributes.
    fn attributes(&self) -> PortalAttributes;
}

/// Type alias for a boxed backend.
pub type BoxedPortalBackend = Box<dyn PortalBackend>;

impl PortalBackend for BoxedPortalBackend {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn stop(&self) -> Result<()> {
        (**self).stop()
    }

    fn receive(&self, timeout: StackTimeout) -> Result<Option<PortalMessage>> {
        (**self).receive(timeout)
    }

    fn send(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<()> {
        (**self).send(message, timeout)
    }

    fn listen(&self, name: &Name, timeout: StackTimeout) -> Result<()> {
        (**self).listen(name, timeout)
    }

    fn ignore(&self, name: &Name, timeout: StackTimeout) -> Result<()> {
        (**self).ignore(name, timeout)
    }

    fn file_id(&self) -> RawFd {
        (**self).file_id()
    }

    fn set_attributes(&self, attributes: &PortalAttributes) -> Result<()> {
        (**self).set_attributes(attributes)
    }

    fn attributes(&self) -> PortalAttributes {
        (**self).attributes()
    }
}
