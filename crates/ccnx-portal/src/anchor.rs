// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routing anchors: a name prefix bounded by an expiration time.
//!
//! Anchors are plain values exchanged over the control channel next to
//! Listen/Ignore. They are totally ordered (name prefix first, then
//! expiration), hash consistently with equality, and round-trip through
//! both a JSON form and a compact binary form.
//!
//! # Wire Format
//!
//! ```text
//! +------------------+--------------------+----------------------+
//! | URI length (2B)  | Name URI (UTF-8)   | Expire time (8B, i64)|
//! +------------------+--------------------+----------------------+
//! ```
//!
//! All integers are big-endian (network byte order). The expire time is in
//! seconds since the Unix epoch.
//!
//! # JSON Form
//!
//! ```json
//! { "namePrefix": "ccnx:/parc/sensors", "expireTime": 1767225600 }
//! ```
//!
//! # Example
//!
//! ```
//! use ccnx_portal::PortalAnchor;
//!
//! let anchor = PortalAnchor::new("ccnx:/parc".parse().unwrap(), 1_767_225_600);
//!
//! let bytes = anchor.to_bytes().unwrap();
//! assert_eq!(PortalAnchor::from_bytes(&bytes).unwrap(), anchor);
//!
//! let json = anchor.to_json();
//! assert_eq!(PortalAnchor::from_json(&json).unwrap(), anchor);
//! ```

use crate::name::{Name, NameError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Size of the URI length prefix.
pub const ANCHOR_LENGTH_SIZE: usize = 2;

/// Size of the trailing expire-time field.
pub const ANCHOR_EXPIRE_SIZE: usize = 8;

/// Smallest possible encoded anchor (root name `ccnx:/`).
pub const MIN_ANCHOR_SIZE: usize = ANCHOR_LENGTH_SIZE + 6 + ANCHOR_EXPIRE_SIZE;

/// Anchor decoding errors.
#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("Truncated anchor: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Trailing bytes after anchor: {0}")]
    TrailingBytes(usize),

    #[error("Name prefix is not valid UTF-8")]
    InvalidUtf8,

    #[error("Name prefix URI too long: {0} bytes")]
    NameTooLong(usize),

    #[error("Invalid name prefix: {0}")]
    Name(#[from] NameError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A routing anchor: `{name prefix, expiration}`.
///
/// Every field is write-once except the expiration, which can be changed
/// through [`PortalAnchor::set_expire_time`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalAnchor {
    // Field order defines the derived total order.
    name_prefix: Name,
    expire_time: i64,
}

impl PortalAnchor {
    /// Create an anchor expiring at `expire_time` (seconds since the epoch).
    pub fn new(name_prefix: Name, expire_time: i64) -> Self {
        Self {
            name_prefix,
            expire_time,
        }
    }

    /// Create an anchor expiring `lifetime` from now.
    pub fn with_lifetime(name_prefix: Name, lifetime: Duration) -> Self {
        let expire = SystemTime::now()
            .checked_add(lifetime)
            .unwrap_or_else(SystemTime::now);
        Self::new(name_prefix, unix_seconds(expire))
    }

    pub fn name_prefix(&self) -> &Name {
        &self.name_prefix
    }

    /// Expiration in seconds since the Unix epoch.
    pub fn expire_time(&self) -> i64 {
        self.expire_time
    }

    /// Replace the expiration, returning the previous value.
    pub fn set_expire_time(&mut self, expire_time: i64) -> i64 {
        std::mem::replace(&mut self.expire_time, expire_time)
    }

    /// An anchor is valid when its expiration is a real point in time.
    pub fn is_valid(&self) -> bool {
        self.expire_time >= 0
    }

    /// True once `now` is at or past the expiration.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        unix_seconds(now) >= self.expire_time
    }

    /// Three-way comparison: negative, zero or positive.
    pub fn compare(&self, other: &PortalAnchor) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Equality against a possibly absent operand (absent is never equal).
    pub fn equals(&self, other: Option<&PortalAnchor>) -> bool {
        other.is_some_and(|o| self == o)
    }

    /// Hash code consistent with equality.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Append the binary form to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), AnchorError> {
        let uri = self.name_prefix.to_string();
        let len = u16::try_from(uri.len()).map_err(|_| AnchorError::NameTooLong(uri.len()))?;
        out.reserve(ANCHOR_LENGTH_SIZE + uri.len() + ANCHOR_EXPIRE_SIZE);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(uri.as_bytes());
        out.extend_from_slice(&self.expire_time.to_be_bytes());
        Ok(())
    }

    /// Binary form as a new buffer.
    ///
    /// Fails with [`AnchorError::NameTooLong`] when the URI exceeds
    /// `u16::MAX` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AnchorError> {
        let mut out = Vec::new();
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    /// Decode one anchor from the front of `buf`, returning it and the
    /// number of bytes consumed.
    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize), AnchorError> {
        if buf.len() < ANCHOR_LENGTH_SIZE {
            return Err(AnchorError::Truncated {
                needed: ANCHOR_LENGTH_SIZE,
                available: buf.len(),
            });
        }
        let uri_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let total = ANCHOR_LENGTH_SIZE + uri_len + ANCHOR_EXPIRE_SIZE;
        if buf.len() < total {
            return Err(AnchorError::Truncated {
                needed: total,
                available: buf.len(),
            });
        }

        let uri_end = ANCHOR_LENGTH_SIZE + uri_len;
        let uri = std::str::from_utf8(&buf[ANCHOR_LENGTH_SIZE..uri_end])
            .map_err(|_| AnchorError::InvalidUtf8)?;
        let name_prefix = Name::parse(uri)?;

        let mut expire = [0u8; ANCHOR_EXPIRE_SIZE];
        expire.copy_from_slice(&buf[uri_end..total]);

        Ok((Self::new(name_prefix, i64::from_be_bytes(expire)), total))
    }

    /// Decode exactly one anchor; trailing bytes are an error.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, AnchorError> {
        let (anchor, consumed) = Self::deserialize(buf)?;
        if consumed != buf.len() {
            return Err(AnchorError::TrailingBytes(buf.len() - consumed));
        }
        Ok(anchor)
    }

    /// Structured (JSON) form.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "namePrefix": self.name_prefix.to_string(),
            "expireTime": self.expire_time,
        })
    }

    /// Rebuild an anchor from its JSON form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, AnchorError> {
        Ok(serde_json::from_value(json.clone())?)
    }

    /// Parse an anchor from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, AnchorError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl fmt::Display for PortalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ .namePrefix={}, .expireTime={} }}",
            self.name_prefix, self.expire_time
        )
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}
