// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portal stack handle.
//!
//! A [`PortalStack`] binds one backend for its whole life and dispatches the
//! uniform operations to it. Handles are reference counted: [`acquire`]
//! returns another handle to the same stack, and the stack is torn down when
//! the last handle is dropped.
//!
//! # Teardown Order
//!
//! Backend state is released before the factory reference, so a backend may
//! rely on factory-owned resources until its own `Drop` has run.
//!
//! [`acquire`]: PortalStack::acquire

use crate::attributes::PortalAttributes;
use crate::backend::{BoxedPortalBackend, PortalBackend};
use crate::error::Result;
use crate::factory::{KeyId, PortalFactory};
use crate::message::PortalMessage;
use crate::name::Name;
use crate::timeout::StackTimeout;
use std::collections::BTreeMap;
use std::fmt;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

struct StackInner {
    // Field order is drop order: backend first, then factory.
    backend: BoxedPortalBackend,
    factory: PortalFactory,
    last_error: AtomicI32,
}

impl Drop for StackInner {
    fn drop(&mut self) {
        log::debug!("[portal] {} stack released", self.backend.kind());
    }
}

/// Handle to a portal stack.
#[derive(Clone)]
pub struct PortalStack {
    inner: Arc<StackInner>,
}

impl PortalStack {
    /// Bind `backend` into a new stack holding a reference to `factory`.
    pub fn new(factory: PortalFactory, backend: BoxedPortalBackend) -> Self {
        log::debug!("[portal] {} stack created", backend.kind());
        Self {
            inner: Arc::new(StackInner {
                backend,
                factory,
                last_error: AtomicI32::new(0),
            }),
        }
    }

    /// Another handle to the same stack.
    pub fn acquire(&self) -> Self {
        self.clone()
    }

    /// Number of live handles to this stack.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// True when both handles refer to the same stack.
    pub fn same_stack(&self, other: &PortalStack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Short name of the bound backend.
    pub fn backend_kind(&self) -> &'static str {
        self.inner.backend.kind()
    }

    pub fn start(&self) -> Result<()> {
        let result = self.inner.backend.start();
        if result.is_ok() {
            log::debug!("[portal] {} stack started", self.backend_kind());
        }
        self.record(result)
    }

    pub fn stop(&self) -> Result<()> {
        let result = self.inner.backend.stop();
        if result.is_ok() {
            log::debug!("[portal] {} stack stopped", self.backend_kind());
        }
        self.record(result)
    }

    /// Next inbound message, or `None` when `timeout` elapses first.
    pub fn receive(&self, timeout: StackTimeout) -> Result<Option<PortalMessage>> {
        self.record(self.inner.backend.receive(timeout))
    }

    /// Send `message`, waiting at most `timeout` for the transport.
    pub fn send(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<()> {
        self.record(self.inner.backend.send(message, timeout))
    }

    /// Register interest in messages under `name`.
    pub fn listen(&self, name: &Name, timeout: StackTimeout) -> Result<()> {
        let result = self.inner.backend.listen(name, timeout);
        if result.is_ok() {
            log::debug!("[portal] listen {}", name);
        }
        self.record(result)
    }

    /// Withdraw interest in messages under `name`.
    pub fn ignore(&self, name: &Name, timeout: StackTimeout) -> Result<()> {
        let result = self.inner.backend.ignore(name, timeout);
        if result.is_ok() {
            log::debug!("[portal] ignore {}", name);
        }
        self.record(result)
    }

    /// Descriptor that polls readable when `receive(Immediate)` would yield.
    pub fn file_id(&self) -> RawFd {
        self.inner.backend.file_id()
    }

    pub fn attributes(&self) -> PortalAttributes {
        self.inner.backend.attributes()
    }

    /// Replace the backend attributes; on rejection the old value is kept.
    pub fn set_attributes(&self, attributes: &PortalAttributes) -> Result<()> {
        self.record(self.inner.backend.set_attributes(attributes))
    }

    /// POSIX code of the most recent failing operation (0 if none).
    pub fn error_code(&self) -> i32 {
        self.inner.last_error.load(Ordering::Relaxed)
    }

    pub fn factory(&self) -> &PortalFactory {
        &self.inner.factory
    }

    pub fn key_id(&self) -> &KeyId {
        self.inner.factory.key_id()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        self.inner.factory.properties()
    }

    /// Factory property `name`, or `default` when unset.
    pub fn property<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.inner.factory.property(name, default)
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            let code = e.error_code();
            self.inner.last_error.store(code, Ordering::Relaxed);
            log::debug!(
                "[portal] {} operation failed (code {}): {}",
                self.backend_kind(),
                code,
                e
            );
        }
        result
    }
}

impl AsRawFd for PortalStack {
    fn as_raw_fd(&self) -> RawFd {
        self.file_id()
    }
}

impl fmt::Debug for PortalStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalStack")
            .field("backend", &self.backend_kind())
            .field("references", &self.reference_count())
            .field("error_code", &self.error_code())
            .finish()
    }
}
