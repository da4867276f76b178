// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers

//! Stack lifecycle and dispatch tests
//!
//! Uses a recording backend to observe exactly what the stack forwards,
//! when backend state is released, and how failures surface.

use ccnx_portal::{
    Name, PortalAttributes, PortalBackend, PortalError, PortalFactory, PortalMessage,
    PortalStack, Result, StackTimeout,
};
use parking_lot::Mutex;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Probe {
    drops: AtomicUsize,
    calls: Mutex<Vec<String>>,
    factory_refs_at_drop: AtomicUsize,
}

struct RecordingBackend {
    probe: Arc<Probe>,
    factory: Option<PortalFactory>,
    attributes: Mutex<PortalAttributes>,
    send_error: Option<i32>,
}

impl RecordingBackend {
    fn new(probe: &Arc<Probe>) -> Self {
        Self {
            probe: Arc::clone(probe),
            factory: None,
            attributes: Mutex::new(PortalAttributes::default()),
            send_error: None,
        }
    }

    fn failing_send(mut self, code: i32) -> Self {
        self.send_error = Some(code);
        self
    }

    fn watching(mut self, factory: &PortalFactory) -> Self {
        self.factory = Some(factory.clone());
        self
    }

    fn log(&self, call: String) {
        self.probe.calls.lock().push(call);
    }
}

impl PortalBackend for RecordingBackend {
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn start(&self) -> Result<()> {
        self.log("start".into());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.log("stop".into());
        Ok(())
    }

    fn receive(&self, timeout: StackTimeout) -> Result<Option<PortalMessage>> {
        self.log(format!("receive {}", timeout));
        Ok(None)
    }

    fn send(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<()> {
        self.log(format!("send {} {}", message.name(), timeout));
        match self.send_error {
            Some(code) => Err(PortalError::from_code(code)),
            None => Ok(()),
        }
    }

    fn listen(&self, name: &Name, _timeout: StackTimeout) -> Result<()> {
        self.log(format!("listen {}", name));
        Ok(())
    }

    fn ignore(&self, name: &Name, _timeout: StackTimeout) -> Result<()> {
        self.log(format!("ignore {}", name));
        Ok(())
    }

    fn file_id(&self) -> RawFd {
        42
    }

    fn set_attributes(&self, attributes: &PortalAttributes) -> Result<()> {
        if attributes.queue_depth > 1024 {
            return Err(PortalError::AttributesRejected("too deep".into()));
        }
        *self.attributes.lock() = attributes.clone();
        Ok(())
    }

    fn attributes(&self) -> PortalAttributes {
        self.attributes.lock().clone()
    }
}

impl Drop for RecordingBackend {
    fn drop(&mut self) {
        if let Some(factory) = &self.factory {
            self.probe
                .factory_refs_at_drop
                .store(factory.reference_count(), Ordering::SeqCst);
        }
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn name(uri: &str) -> Name {
    uri.parse().expect("name")
}

#[test]
fn test_release_drops_backend_once_and_restores_factory_count() {
    let factory = PortalFactory::default();
    let before = factory.reference_count();
    let probe = Arc::new(Probe::default());

    let stack = factory.create_stack(RecordingBackend::new(&probe));
    assert_eq!(factory.reference_count(), before + 1);

    let copy = stack.acquire();
    drop(stack);
    assert_eq!(probe.drops.load(Ordering::SeqCst), 0);

    drop(copy);
    assert_eq!(probe.drops.load(Ordering::SeqCst), 1);
    assert_eq!(factory.reference_count(), before);
}

#[test]
fn test_backend_released_before_factory_reference() {
    let factory = PortalFactory::default();
    let probe = Arc::new(Probe::default());

    // The backend's own clone plus the caller's plus the stack's
    let stack = factory.create_stack(RecordingBackend::new(&probe).watching(&factory));
    assert_eq!(factory.reference_count(), 3);

    drop(stack);
    assert_eq!(probe.factory_refs_at_drop.load(Ordering::SeqCst), 3);
    assert_eq!(factory.reference_count(), 1);
}

#[test]
fn test_acquired_handle_uses_same_backend() {
    let probe = Arc::new(Probe::default());
    let stack = PortalFactory::default().create_stack(RecordingBackend::new(&probe));

    let copy = stack.acquire();
    copy.start().expect("start");
    drop(copy);

    stack.listen(&name("ccnx:/a"), StackTimeout::Never).expect("listen");
    assert_eq!(stack.reference_count(), 1);
    assert_eq!(*probe.calls.lock(), vec!["start", "listen ccnx:/a"]);
}

#[test]
fn test_operations_dispatch_to_backend() {
    let probe = Arc::new(Probe::default());
    let stack = PortalFactory::default().create_stack(RecordingBackend::new(&probe));

    stack.start().expect("start");
    stack.listen(&name("ccnx:/a"), StackTimeout::Never).expect("listen");
    assert_eq!(stack.receive(StackTimeout::Immediate).expect("receive"), None);
    stack
        .send(
            &PortalMessage::interest(name("ccnx:/a/1")),
            StackTimeout::from_micros(500),
        )
        .expect("send");
    stack.ignore(&name("ccnx:/a"), StackTimeout::Never).expect("ignore");
    stack.stop().expect("stop");

    assert_eq!(stack.file_id(), 42);
    assert_eq!(
        *probe.calls.lock(),
        vec![
            "start",
            "listen ccnx:/a",
            "receive immediate",
            "send ccnx:/a/1 500us",
            "ignore ccnx:/a",
            "stop",
        ]
    );
}

#[test]
fn test_error_code_reflects_failed_send() {
    let probe = Arc::new(Probe::default());
    let stack = PortalFactory::default()
        .create_stack(RecordingBackend::new(&probe).failing_send(libc::EPIPE));

    let err = stack
        .send(&PortalMessage::interest(name("ccnx:/x")), StackTimeout::Immediate)
        .expect_err("send fails");
    assert_eq!(err.error_code(), libc::EPIPE);
    assert_eq!(stack.error_code(), libc::EPIPE);
}

#[test]
fn test_set_attributes_accept_and_reject() {
    let probe = Arc::new(Probe::default());
    let stack: PortalStack = PortalFactory::default().create_stack(RecordingBackend::new(&probe));

    let accepted = PortalAttributes::logging().with_queue_depth(16);
    stack.set_attributes(&accepted).expect("accepted");
    assert_eq!(stack.attributes(), accepted);

    let err = stack
        .set_attributes(&PortalAttributes::default().with_queue_depth(4096))
        .expect_err("rejected");
    assert_eq!(err.error_code(), libc::EINVAL);
    assert_eq!(stack.attributes(), accepted);
    assert_eq!(stack.error_code(), libc::EINVAL);
}
