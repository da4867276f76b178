// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by portal stack operations.
//!
//! Every fallible operation returns its own [`PortalError`]; the POSIX code
//! of a failure is available through [`PortalError::error_code`], so callers
//! never depend on thread-global `errno` state.

use crate::name::Name;
use std::io;
use thiserror::Error;

/// Errors surfaced by a portal stack or its backend.
#[derive(Debug, Error)]
pub enum PortalError {
    /// I/O error with underlying cause.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bounded wait elapsed before the operation could complete.
    #[error("Operation timed out")]
    Timeout,

    /// Non-blocking call could not complete immediately.
    #[error("Operation would block")]
    WouldBlock,

    /// Backend has not been started (or was stopped).
    #[error("Backend not connected")]
    NotConnected,

    /// Ignore was called for a prefix that is not registered.
    #[error("Name prefix not registered: {0}")]
    NotRegistered(Name),

    /// Backend refused the requested attributes.
    #[error("Attributes rejected: {0}")]
    AttributesRejected(String),

    /// Backend-defined failure carrying its own POSIX code.
    #[error("Backend error (code {code}): {message}")]
    Backend {
        /// POSIX-style error code.
        code: i32,
        /// Human readable cause.
        message: String,
    },
}

impl PortalError {
    /// Build a backend error from a raw POSIX code.
    pub fn from_code(code: i32) -> Self {
        PortalError::Backend {
            code,
            message: io::Error::from_raw_os_error(code).to_string(),
        }
    }

    /// POSIX-style error code describing this failure.
    pub fn error_code(&self) -> i32 {
        match self {
            PortalError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            PortalError::Timeout => libc::ETIMEDOUT,
            PortalError::WouldBlock => libc::EAGAIN,
            PortalError::NotConnected => libc::ENOTCONN,
            PortalError::NotRegistered(_) => libc::ENOENT,
            PortalError::AttributesRejected(_) => libc::EINVAL,
            PortalError::Backend { code, .. } => *code,
        }
    }
}

/// Convenient alias for portal results.
pub type Result<T> = std::result::Result<T, PortalError>;
