// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stack timeout values.
//!
//! Every operation that may suspend the caller takes a [`StackTimeout`]:
//!
//! | Microseconds | Variant                     | Behaviour                  |
//! |--------------|-----------------------------|----------------------------|
//! | `< 0`        | [`StackTimeout::Never`]     | block until completion     |
//! | `0`          | [`StackTimeout::Immediate`] | poll, never block          |
//! | `> 0`        | [`StackTimeout::Micros`]    | wait at most that long     |
//!
//! # Example
//!
//! ```
//! use ccnx_portal::StackTimeout;
//! use std::time::Duration;
//!
//! assert_eq!(StackTimeout::from_micros(-1), StackTimeout::Never);
//! assert_eq!(StackTimeout::from_micros(0), StackTimeout::Immediate);
//! assert_eq!(
//!     StackTimeout::from_micros(1500).duration(),
//!     Some(Duration::from_micros(1500))
//! );
//! ```

use std::fmt;
use std::time::{Duration, Instant};

/// Signed microsecond timeout with three semantic regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackTimeout {
    /// Wait indefinitely.
    Never,
    /// Return immediately without waiting.
    Immediate,
    /// Wait up to this many microseconds (always > 0).
    Micros(u64),
}

impl StackTimeout {
    /// Decode the signed microsecond encoding.
    pub fn from_micros(micros: i64) -> Self {
        match micros {
            m if m < 0 => StackTimeout::Never,
            0 => StackTimeout::Immediate,
            m => StackTimeout::Micros(m as u64),
        }
    }

    /// Bounded wait from a `Duration` (zero maps to `Immediate`).
    pub fn from_duration(duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        if micros == 0 {
            StackTimeout::Immediate
        } else {
            StackTimeout::Micros(micros)
        }
    }

    /// Bounded wait in milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self::from_duration(Duration::from_millis(millis))
    }

    /// Signed microsecond encoding (`-1` for `Never`).
    pub fn as_micros(&self) -> i64 {
        match self {
            StackTimeout::Never => -1,
            StackTimeout::Immediate => 0,
            StackTimeout::Micros(m) => i64::try_from(*m).unwrap_or(i64::MAX),
        }
    }

    /// Maximum wait, or `None` when blocking indefinitely.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            StackTimeout::Never => None,
            StackTimeout::Immediate => Some(Duration::ZERO),
            StackTimeout::Micros(m) => Some(Duration::from_micros(*m)),
        }
    }

    /// True for the non-blocking poll variant.
    pub fn is_immediate(&self) -> bool {
        matches!(self, StackTimeout::Immediate)
    }

    /// Absolute deadline measured from now.
    pub fn deadline(&self) -> Deadline {
        Deadline {
            at: self
                .duration()
                .map(|d| Instant::now().checked_add(d).unwrap_or_else(far_future)),
        }
    }

    /// Timeout argument for `poll(2)`: `-1`, `0`, or milliseconds rounded up.
    pub fn poll_millis(&self) -> libc::c_int {
        match self {
            StackTimeout::Never => -1,
            StackTimeout::Immediate => 0,
            StackTimeout::Micros(m) => {
                let ms = m.div_ceil(1000);
                libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
            }
        }
    }
}

impl From<Duration> for StackTimeout {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl From<Option<Duration>> for StackTimeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(StackTimeout::Never, Self::from_duration)
    }
}

impl fmt::Display for StackTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackTimeout::Never => write!(f, "never"),
            StackTimeout::Immediate => write!(f, "immediate"),
            StackTimeout::Micros(m) => write!(f, "{}us", m),
        }
    }
}

fn far_future() -> Instant {
    // ~30 years; large enough to be indistinguishable from forever
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

/// Absolute point in time derived from a [`StackTimeout`].
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline that never expires.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// Instant at which the wait must end, `None` when unbounded.
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Remaining time, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}
