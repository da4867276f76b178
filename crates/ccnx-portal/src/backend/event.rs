// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness descriptor exported through `PortalStack::file_id`.
//!
//! Backed by a non-blocking `eventfd`: the descriptor polls readable while
//! the owning backend has at least one message queued, so callers can
//! multiplex several stacks with `poll(2)`/`select(2)` instead of blocking
//! in `receive`.

use crate::timeout::StackTimeout;
use std::io;
use std::os::fd::{AsRawFd, RawFd};

const EVENTFD_FLAGS: libc::c_int = libc::EFD_NONBLOCK | libc::EFD_CLOEXEC;

/// Level-style readiness flag backed by an eventfd.
#[derive(Debug)]
pub struct ReadinessEvent {
    fd: RawFd,
}

impl ReadinessEvent {
    /// Create a new, initially non-readable event.
    pub fn new() -> io::Result<Self> {
        // SAFETY: eventfd is invoked with valid flags and no shared state.
        let fd = unsafe { libc::eventfd(0, EVENTFD_FLAGS) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Make the descriptor readable.
    pub fn signal(&self) {
        let payload = 1u64.to_ne_bytes();
        loop {
            // SAFETY: payload references a stack buffer with the 8-byte eventfd payload.
            let ret = unsafe { libc::write(self.fd, payload.as_ptr().cast(), payload.len()) };
            if ret >= 0 {
                break;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                // Counter saturated: already readable
                io::ErrorKind::WouldBlock => break,
                _ => {
                    log::debug!("[portal] readiness eventfd write failed: {}", err);
                    break;
                }
            }
        }
    }

    /// Clear readability.
    pub fn drain(&self) {
        let mut payload = [0u8; 8];
        loop {
            // SAFETY: payload is a stack buffer sized to the eventfd read requirements (8 bytes).
            let ret = unsafe { libc::read(self.fd, payload.as_mut_ptr().cast(), payload.len()) };
            if ret >= 0 {
                break;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => break,
                _ => {
                    log::debug!("[portal] readiness eventfd read failed: {}", err);
                    break;
                }
            }
        }
    }

    /// Poll the descriptor; `Ok(true)` when readable within `timeout`.
    pub fn wait(&self, timeout: StackTimeout) -> io::Result<bool> {
        poll_readable(self.fd, timeout)
    }
}

impl AsRawFd for ReadinessEvent {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for ReadinessEvent {
    fn drop(&mut self) {
        // SAFETY: fd was obtained via libc::eventfd and is closed once here.
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Wait until `fd` is readable or `timeout` elapses.
///
/// Usable with any descriptor returned by `PortalStack::file_id`.
pub fn poll_readable(fd: RawFd, timeout: StackTimeout) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.poll_millis();

    loop {
        let poll_target = std::ptr::addr_of_mut!(pollfd);
        // SAFETY: poll_target points to our stack-allocated pollfd structure.
        let res = unsafe { libc::poll(poll_target, 1, timeout_ms) };
        if res == 0 {
            return Ok(false);
        }
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(pollfd.revents & libc::POLLIN != 0);
    }
}
