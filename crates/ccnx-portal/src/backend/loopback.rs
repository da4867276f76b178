// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport.
//!
//! A [`LoopbackHub`] plays the local forwarder: every [`LoopbackBackend`]
//! connected to it is an endpoint with its own listened prefixes and bounded
//! receive queue. Sending on one endpoint delivers to every *other* endpoint
//! with a matching prefix; [`LoopbackHub::inject`] delivers from outside any
//! endpoint, which is how tests feed a stack deterministically.
//!
//! # Design
//!
//! ```text
//! LoopbackHub
//! +-- Endpoint 1  [prefixes] [queue: depth N] [eventfd]
//! +-- Endpoint 2  [prefixes] [queue: depth N] [eventfd]
//! +-- ...
//! ```
//!
//! - Senders block on a full queue, bounded by their timeout
//! - The eventfd is readable while the queue is non-empty
//! - Sending requires `start()`; receiving, listening and ignoring do not
//!
//! # Ignore Drain Policy
//!
//! When `ignore` succeeds, queued messages that no longer match any of the
//! endpoint's remaining prefixes are discarded. Messages still covered by
//! another listened prefix stay queued.

use super::event::ReadinessEvent;
use super::PortalBackend;
use crate::attributes::PortalAttributes;
use crate::error::{PortalError, Result};
use crate::message::PortalMessage;
use crate::name::Name;
use crate::timeout::{Deadline, StackTimeout};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{BTreeSet, VecDeque};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Largest queue depth an endpoint accepts.
pub const MAX_QUEUE_DEPTH: usize = 65_536;

/// In-process forwarder shared by loopback endpoints.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    endpoints: Mutex<Vec<Weak<Endpoint>>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
    unmatched: AtomicU64,
    dropped: AtomicU64,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint with the given attributes.
    pub fn connect(&self, attributes: PortalAttributes) -> Result<LoopbackBackend> {
        validate_attributes(&attributes, 0)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let endpoint = Arc::new(Endpoint {
            id,
            state: Mutex::new(EndpointState {
                started: false,
                prefixes: BTreeSet::new(),
                queue: VecDeque::new(),
                attributes,
                closed: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            event: ReadinessEvent::new()?,
        });

        let mut endpoints = self.inner.endpoints.lock();
        endpoints.retain(|weak| weak.strong_count() > 0);
        endpoints.push(Arc::downgrade(&endpoint));
        drop(endpoints);

        log::debug!("[loopback] endpoint {} connected", id);

        Ok(LoopbackBackend {
            hub: self.clone(),
            endpoint,
        })
    }

    /// Deliver `message` to every endpoint listening on a matching prefix.
    ///
    /// Returns the number of endpoints that queued the message. Fails only
    /// when no endpoint queued it; see [`LoopbackHub::dropped`].
    pub fn inject(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<usize> {
        self.route(None, message, timeout)
    }

    /// Number of live endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.inner
            .endpoints
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Total messages queued on endpoints.
    pub fn delivered(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// Messages that matched no listening endpoint.
    pub fn unmatched(&self) -> u64 {
        self.inner.unmatched.load(Ordering::Relaxed)
    }

    /// Per-endpoint deliveries abandoned because the queue stayed full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn route(
        &self,
        source: Option<u64>,
        message: &PortalMessage,
        timeout: StackTimeout,
    ) -> Result<usize> {
        let targets: Vec<Arc<Endpoint>> = self
            .inner
            .endpoints
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|endpoint| Some(endpoint.id) != source)
            .collect();

        // Full endpoints do not stop the fan-out: an error is returned only
        // when nothing was queued, so a retry never duplicates a message.
        let deadline = timeout.deadline();
        let mut delivered = 0;
        let mut dropped = 0;
        let mut failure = None;
        for endpoint in targets {
            match endpoint.offer(message, timeout, deadline) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => {
                    dropped += 1;
                    failure.get_or_insert(e);
                }
            }
        }

        self.inner
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.inner.dropped.fetch_add(dropped, Ordering::Relaxed);

        match failure {
            Some(e) if delivered == 0 => Err(e),
            Some(_) => {
                log::debug!(
                    "[loopback] {} queued on {} endpoint(s), dropped on {}",
                    message.name(),
                    delivered,
                    dropped
                );
                Ok(delivered)
            }
            None => {
                if delivered == 0 {
                    self.inner.unmatched.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[loopback] no listener for {}", message.name());
                }
                Ok(delivered)
            }
        }
    }

    fn detach(&self, id: u64) {
        self.inner
            .endpoints
            .lock()
            .retain(|weak| weak.upgrade().is_some_and(|endpoint| endpoint.id != id));
    }
}

struct Endpoint {
    id: u64,
    state: Mutex<EndpointState>,
    readable: Condvar,
    writable: Condvar,
    event: ReadinessEvent,
}

struct EndpointState {
    started: bool,
    prefixes: BTreeSet<Name>,
    queue: VecDeque<PortalMessage>,
    attributes: PortalAttributes,
    closed: bool,
}

impl EndpointState {
    fn accepts(&self, message: &PortalMessage) -> bool {
        !self.closed && self.prefixes.iter().any(|prefix| message.matches(prefix))
    }
}

impl Endpoint {
    /// Queue `message` if a prefix matches; `Ok(false)` when none does.
    ///
    /// The match is re-evaluated after every wait, so an `ignore` or a
    /// release that happens while the sender is blocked is honoured.
    fn offer(
        &self,
        message: &PortalMessage,
        timeout: StackTimeout,
        deadline: Deadline,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        loop {
            if !state.accepts(message) {
                return Ok(false);
            }
            if state.queue.len() < state.attributes.queue_depth {
                break;
            }
            if !self.wait_until(&self.writable, &mut state, deadline) {
                log::debug!(
                    "[loopback] endpoint {} queue full ({}), send timed out",
                    self.id,
                    state.queue.len()
                );
                return Err(if timeout.is_immediate() {
                    PortalError::WouldBlock
                } else {
                    PortalError::Timeout
                });
            }
        }

        if state.attributes.logging {
            log::info!("[loopback] endpoint {} <- {}", self.id, message);
        }
        state.queue.push_back(message.clone());
        self.event.signal();
        self.readable.notify_one();
        Ok(true)
    }

    fn take(&self, deadline: Deadline) -> Option<PortalMessage> {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.queue.pop_front() {
                if state.queue.is_empty() {
                    self.event.drain();
                }
                self.writable.notify_all();
                return Some(message);
            }
            if !self.wait_until(&self.readable, &mut state, deadline) {
                return None;
            }
        }
    }

    /// Wait on `cond`; false once `deadline` has passed.
    fn wait_until(
        &self,
        cond: &Condvar,
        state: &mut MutexGuard<'_, EndpointState>,
        deadline: Deadline,
    ) -> bool {
        match deadline.instant() {
            None => {
                cond.wait(state);
                true
            }
            Some(_) if deadline.is_expired() => false,
            Some(at) => {
                cond.wait_until(state, at);
                true
            }
        }
    }
}

fn validate_attributes(attributes: &PortalAttributes, queued: usize) -> Result<()> {
    if attributes.queue_depth == 0 || attributes.queue_depth > MAX_QUEUE_DEPTH {
        return Err(PortalError::AttributesRejected(format!(
            "queue_depth {} outside 1..={}",
            attributes.queue_depth, MAX_QUEUE_DEPTH
        )));
    }
    if attributes.queue_depth < queued {
        return Err(PortalError::AttributesRejected(format!(
            "queue_depth {} below {} queued messages",
            attributes.queue_depth, queued
        )));
    }
    Ok(())
}

/// Loopback endpoint bound into a portal stack.
pub struct LoopbackBackend {
    hub: LoopbackHub,
    endpoint: Arc<Endpoint>,
}

impl LoopbackBackend {
    /// Endpoint identifier within its hub.
    pub fn id(&self) -> u64 {
        self.endpoint.id
    }

    /// Messages currently queued for `receive`.
    pub fn queued(&self) -> usize {
        self.endpoint.state.lock().queue.len()
    }

    /// Currently listened prefixes.
    pub fn prefixes(&self) -> Vec<Name> {
        self.endpoint.state.lock().prefixes.iter().cloned().collect()
    }
}

impl PortalBackend for LoopbackBackend {
    fn kind(&self) -> &'static str {
        "loopback"
    }

    fn start(&self) -> Result<()> {
        self.endpoint.state.lock().started = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.endpoint.state.lock().started = false;
        Ok(())
    }

    fn receive(&self, timeout: StackTimeout) -> Result<Option<PortalMessage>> {
        Ok(self.endpoint.take(timeout.deadline()))
    }

    fn send(&self, message: &PortalMessage, timeout: StackTimeout) -> Result<()> {
        if !self.endpoint.state.lock().started {
            return Err(PortalError::NotConnected);
        }
        self.hub.route(Some(self.endpoint.id), message, timeout)?;
        Ok(())
    }

    fn listen(&self, name: &Name, _timeout: StackTimeout) -> Result<()> {
        if self.endpoint.state.lock().prefixes.insert(name.clone()) {
            log::debug!("[loopback] endpoint {} listening on {}", self.endpoint.id, name);
        }
        Ok(())
    }

    fn ignore(&self, name: &Name, _timeout: StackTimeout) -> Result<()> {
        let mut state = self.endpoint.state.lock();
        if !state.prefixes.remove(name) {
            return Err(PortalError::NotRegistered(name.clone()));
        }

        let before = state.queue.len();
        let EndpointState {
            prefixes, queue, ..
        } = &mut *state;
        queue.retain(|message| prefixes.iter().any(|p| message.matches(p)));
        let discarded = before - state.queue.len();

        if state.queue.is_empty() {
            self.endpoint.event.drain();
        }
        // Blocked senders re-check their match against the new prefix set
        self.endpoint.writable.notify_all();
        if discarded > 0 {
            log::debug!(
                "[loopback] endpoint {} ignored {}, discarded {} queued",
                self.endpoint.id,
                name,
                discarded
            );
        }
        Ok(())
    }

    fn file_id(&self) -> RawFd {
        self.endpoint.event.as_raw_fd()
    }

    fn set_attributes(&self, attributes: &PortalAttributes) -> Result<()> {
        let mut state = self.endpoint.state.lock();
        validate_attributes(attributes, state.queue.len())?;
        state.attributes = attributes.clone();
        // A larger queue may unblock senders
        self.endpoint.writable.notify_all();
        Ok(())
    }

    fn attributes(&self) -> PortalAttributes {
        self.endpoint.state.lock().attributes.clone()
    }
}

impl Drop for LoopbackBackend {
    fn drop(&mut self) {
        self.hub.detach(self.endpoint.id);

        // Senders already holding this endpoint must not wait on it forever
        let mut state = self.endpoint.state.lock();
        state.closed = true;
        state.queue.clear();
        drop(state);
        self.endpoint.writable.notify_all();

        log::debug!("[loopback] endpoint {} released", self.endpoint.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn name(uri: &str) -> Name {
        uri.parse().expect("name")
    }

    fn started(hub: &LoopbackHub) -> LoopbackBackend {
        let backend = hub.connect(PortalAttributes::default()).expect("connect");
        backend.start().expect("start");
        backend
    }

    #[test]
    fn test_send_routes_to_other_listeners_only() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        let b = started(&hub);
        a.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");
        b.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");

        let msg = PortalMessage::interest(name("ccnx:/x/1"));
        a.send(&msg, StackTimeout::Immediate).expect("send");

        assert_eq!(a.queued(), 0);
        assert_eq!(b.receive(StackTimeout::Immediate).expect("recv"), Some(msg));
        assert_eq!(hub.delivered(), 1);
    }

    #[test]
    fn test_unmatched_message_is_counted() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        let _b = started(&hub);

        let msg = PortalMessage::interest(name("ccnx:/nobody"));
        a.send(&msg, StackTimeout::Immediate).expect("send");
        assert_eq!(hub.unmatched(), 1);
    }

    #[test]
    fn test_send_before_start_not_connected() {
        let hub = LoopbackHub::new();
        let a = hub.connect(PortalAttributes::default()).expect("connect");
        let err = a
            .send(&PortalMessage::interest(name("ccnx:/x")), StackTimeout::Immediate)
            .expect_err("not started");
        assert!(matches!(err, PortalError::NotConnected));

        a.start().expect("start");
        a.stop().expect("stop");
        assert!(a
            .send(&PortalMessage::interest(name("ccnx:/x")), StackTimeout::Immediate)
            .is_err());
    }

    #[test]
    fn test_listen_is_idempotent_and_ignore_unknown_fails() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        a.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");
        a.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen again");
        assert_eq!(a.prefixes(), vec![name("ccnx:/x")]);

        let err = a
            .ignore(&name("ccnx:/y"), StackTimeout::Never)
            .expect_err("unknown prefix");
        assert_eq!(err.error_code(), libc::ENOENT);
    }

    #[test]
    fn test_full_queue_blocks_sender_until_timeout() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        let b = hub
            .connect(PortalAttributes::default().with_queue_depth(1))
            .expect("connect");
        b.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");

        let msg = PortalMessage::interest(name("ccnx:/x"));
        a.send(&msg, StackTimeout::Immediate).expect("first fits");

        let err = a
            .send(&msg, StackTimeout::Immediate)
            .expect_err("queue full");
        assert!(matches!(err, PortalError::WouldBlock));

        let start = Instant::now();
        let err = a
            .send(&msg, StackTimeout::from_millis(30))
            .expect_err("queue full");
        assert!(matches!(err, PortalError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_fan_out_reports_partial_delivery() {
        let hub = LoopbackHub::new();
        let roomy = started(&hub);
        let full = hub
            .connect(PortalAttributes::default().with_queue_depth(1))
            .expect("connect");
        roomy.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");
        full.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");

        let msg = PortalMessage::interest(name("ccnx:/x/1"));
        assert_eq!(hub.inject(&msg, StackTimeout::Immediate).expect("both"), 2);

        // `full` is at depth; `roomy` still takes the message
        assert_eq!(hub.inject(&msg, StackTimeout::Immediate).expect("partial"), 1);
        assert_eq!(roomy.queued(), 2);
        assert_eq!(full.queued(), 1);
        assert_eq!(hub.delivered(), 3);
        assert_eq!(hub.dropped(), 1);

        // Nothing queued anywhere: the caller sees the failure
        roomy.ignore(&name("ccnx:/x"), StackTimeout::Never).expect("ignore");
        let err = hub
            .inject(&msg, StackTimeout::Immediate)
            .expect_err("only full endpoint left");
        assert!(matches!(err, PortalError::WouldBlock));
        assert_eq!(hub.delivered(), 3);
        assert_eq!(hub.dropped(), 2);
    }

    #[test]
    fn test_blocked_sender_resumes_after_receive() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        let b = hub
            .connect(PortalAttributes::default().with_queue_depth(1))
            .expect("connect");
        b.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");

        let msg = PortalMessage::interest(name("ccnx:/x"));
        a.send(&msg, StackTimeout::Immediate).expect("first fits");

        std::thread::scope(|s| {
            let sender = s.spawn(|| a.send(&msg, StackTimeout::Never));
            std::thread::sleep(Duration::from_millis(20));
            assert!(b.receive(StackTimeout::Immediate).expect("recv").is_some());
            sender.join().expect("join").expect("second send");
        });
        assert_eq!(b.queued(), 1);
    }

    #[test]
    fn test_ignore_discards_only_uncovered_messages() {
        let hub = LoopbackHub::new();
        let b = started(&hub);
        b.listen(&name("ccnx:/a"), StackTimeout::Never).expect("listen");
        b.listen(&name("ccnx:/a/b"), StackTimeout::Never).expect("listen");
        b.listen(&name("ccnx:/c"), StackTimeout::Never).expect("listen");

        for uri in ["ccnx:/a/b/1", "ccnx:/c/1", "ccnx:/a/2"] {
            hub.inject(&PortalMessage::interest(name(uri)), StackTimeout::Never)
                .expect("inject");
        }
        assert_eq!(b.queued(), 3);

        // ccnx:/a/b still covers ccnx:/a/b/1 through ccnx:/a
        b.ignore(&name("ccnx:/a/b"), StackTimeout::Never).expect("ignore");
        assert_eq!(b.queued(), 3);

        b.ignore(&name("ccnx:/c"), StackTimeout::Never).expect("ignore");
        assert_eq!(b.queued(), 2);

        b.ignore(&name("ccnx:/a"), StackTimeout::Never).expect("ignore");
        assert_eq!(b.queued(), 0);
        assert!(!b.endpoint.event.wait(StackTimeout::Immediate).expect("poll"));
    }

    #[test]
    fn test_readiness_follows_queue() {
        let hub = LoopbackHub::new();
        let b = started(&hub);
        b.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");
        let fd = b.file_id();
        assert!(!super::super::poll_readable(fd, StackTimeout::Immediate).expect("poll"));

        hub.inject(&PortalMessage::interest(name("ccnx:/x/1")), StackTimeout::Never)
            .expect("inject");
        hub.inject(&PortalMessage::interest(name("ccnx:/x/2")), StackTimeout::Never)
            .expect("inject");
        assert!(super::super::poll_readable(fd, StackTimeout::Immediate).expect("poll"));

        b.receive(StackTimeout::Immediate).expect("recv");
        assert!(super::super::poll_readable(fd, StackTimeout::Immediate).expect("poll"));

        b.receive(StackTimeout::Immediate).expect("recv");
        assert!(!super::super::poll_readable(fd, StackTimeout::Immediate).expect("poll"));
    }

    #[test]
    fn test_set_attributes_validation() {
        let hub = LoopbackHub::new();
        let b = started(&hub);
        b.listen(&name("ccnx:/x"), StackTimeout::Never).expect("listen");
        for _ in 0..3 {
            hub.inject(&PortalMessage::interest(name("ccnx:/x")), StackTimeout::Never)
                .expect("inject");
        }

        assert!(b
            .set_attributes(&PortalAttributes::default().with_queue_depth(0))
            .is_err());
        assert!(b
            .set_attributes(&PortalAttributes::default().with_queue_depth(2))
            .is_err());
        assert_eq!(b.attributes(), PortalAttributes::default());

        let wanted = PortalAttributes::logging().with_queue_depth(3);
        b.set_attributes(&wanted).expect("accepted");
        assert_eq!(b.attributes(), wanted);
    }

    #[test]
    fn test_connect_rejects_invalid_attributes() {
        let hub = LoopbackHub::new();
        let err = hub
            .connect(PortalAttributes::default().with_queue_depth(MAX_QUEUE_DEPTH + 1))
            .err()
            .expect("rejected");
        assert_eq!(err.error_code(), libc::EINVAL);
    }

    #[test]
    fn test_drop_detaches_endpoint() {
        let hub = LoopbackHub::new();
        let a = started(&hub);
        let b = started(&hub);
        assert_eq!(hub.endpoint_count(), 2);
        drop(b);
        assert_eq!(hub.endpoint_count(), 1);
        drop(a);
        assert_eq!(hub.endpoint_count(), 0);
    }
}
