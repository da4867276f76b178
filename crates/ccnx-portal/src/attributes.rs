// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portal attributes negotiated between a stack and its backend.

use serde::{Deserialize, Serialize};

/// Default receive queue depth for backends that buffer inbound messages.
pub const DEFAULT_QUEUE_DEPTH: usize = 128;

/// Backend-describing attributes attached to a portal stack.
///
/// The backend owns the current value; callers read it through
/// [`PortalStack::attributes`](crate::PortalStack::attributes) and replace it
/// wholesale with
/// [`PortalStack::set_attributes`](crate::PortalStack::set_attributes),
/// which the backend may reject.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortalAttributes {
    /// Emit per-message log records from the backend.
    #[serde(default)]
    pub logging: bool,

    /// Maximum number of inbound messages buffered before senders block.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for PortalAttributes {
    fn default() -> Self {
        Self {
            logging: false,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl PortalAttributes {
    /// Attributes with per-message logging enabled.
    pub fn logging() -> Self {
        Self {
            logging: true,
            ..Default::default()
        }
    }

    /// Set the logging flag.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Set the inbound queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// True when per-message logging is requested.
    pub fn is_logging(&self) -> bool {
        self.logging
    }
}
