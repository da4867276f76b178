// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portal configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.
//!
//! ```toml
//! [factory]
//! key_id = "0a1b2c"
//!
//! [factory.properties]
//! "/localstack/portalFactory/LocalForwarder" = "tcp://127.0.0.1:9695"
//!
//! [attributes]
//! logging = false
//! queue_depth = 128
//!
//! [timeouts]
//! receive_us = -1
//! send_us = 1000000
//! listen_us = 1000000
//! ```

use crate::attributes::PortalAttributes;
use crate::backend::MAX_QUEUE_DEPTH;
use crate::factory::KeyId;
use crate::timeout::StackTimeout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level portal configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub factory: FactoryConfig,

    /// Attributes applied to every stack created from this configuration.
    #[serde(default)]
    pub attributes: PortalAttributes,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl PortalConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.factory.key_id.is_some() && self.factory.parsed_key_id().is_none() {
            return Err(ConfigError::Invalid(
                "factory.key_id is not a hex string".into(),
            ));
        }

        for name in self.factory.properties.keys() {
            if !name.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "Property name '{}' must start with '/'",
                    name
                )));
            }
        }

        let depth = self.attributes.queue_depth;
        if depth == 0 || depth > MAX_QUEUE_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "attributes.queue_depth {} outside 1..={}",
                depth, MAX_QUEUE_DEPTH
            )));
        }

        Ok(())
    }
}

/// `[factory]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Key identifier as hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Factory properties (name -> value).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl FactoryConfig {
    fn parsed_key_id(&self) -> Option<KeyId> {
        match &self.key_id {
            Some(hex) => KeyId::from_hex(hex),
            None => Some(KeyId::default()),
        }
    }

    /// Configured key identifier (empty when unset or invalid).
    pub fn key_id(&self) -> KeyId {
        self.parsed_key_id().unwrap_or_default()
    }
}

/// `[timeouts]` section, in signed microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_receive_us")]
    pub receive_us: i64,

    #[serde(default = "default_op_us")]
    pub send_us: i64,

    #[serde(default = "default_op_us")]
    pub listen_us: i64,
}

fn default_receive_us() -> i64 {
    -1
}

fn default_op_us() -> i64 {
    1_000_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            receive_us: default_receive_us(),
            send_us: default_op_us(),
            listen_us: default_op_us(),
        }
    }
}

impl TimeoutConfig {
    pub fn receive(&self) -> StackTimeout {
        StackTimeout::from_micros(self.receive_us)
    }

    pub fn send(&self) -> StackTimeout {
        StackTimeout::from_micros(self.send_us)
    }

    /// Timeout for listen and ignore.
    pub fn listen(&self) -> StackTimeout {
        StackTimeout::from_micros(self.listen_us)
    }
}
