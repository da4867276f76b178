// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hierarchical CCNx names.
//!
//! Only what the portal layer needs: URI parsing and display, total
//! ordering, and the segment-wise prefix test used for subscriptions.
//! Longest-prefix-match forwarding lives in the forwarder.
//!
//! # URI Form
//!
//! ```text
//! ccnx:/segment/segment/...
//! lci:/segment/segment/...     (accepted on input)
//! ```
//!
//! # Example
//!
//! ```
//! use ccnx_portal::Name;
//!
//! let prefix: Name = "ccnx:/parc/sensors".parse().unwrap();
//! let name: Name = "ccnx:/parc/sensors/temp".parse().unwrap();
//!
//! assert!(name.starts_with(&prefix));
//! assert_eq!(prefix.to_string(), "ccnx:/parc/sensors");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// URI scheme used when displaying names.
pub const NAME_SCHEME: &str = "ccnx:";

/// Legacy scheme accepted when parsing.
pub const LEGACY_NAME_SCHEME: &str = "lci:";

/// Name parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Missing URI scheme (expected ccnx:/ or lci:/): {0}")]
    MissingScheme(String),

    #[error("Name must be absolute (start with '/'): {0}")]
    NotAbsolute(String),

    #[error("Empty segment at position {0}")]
    EmptySegment(usize),

    #[error("Segment at position {0} contains '/'")]
    ReservedCharacter(usize),
}

/// A hierarchical name: an ordered list of segments.
///
/// Ordering is segment-wise lexicographic, so a prefix sorts before every
/// name it is a prefix of.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    segments: Vec<String>,
}

impl Name {
    /// The root name `ccnx:/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from segments; empty segments are rejected.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(pos) = segments.iter().position(String::is_empty) {
            return Err(NameError::EmptySegment(pos));
        }
        if let Some(pos) = segments.iter().position(|s| s.contains('/')) {
            return Err(NameError::ReservedCharacter(pos));
        }
        Ok(Self { segments })
    }

    /// Parse a `ccnx:/a/b` (or `lci:/a/b`) URI.
    pub fn parse(uri: &str) -> Result<Self, NameError> {
        let path = uri
            .strip_prefix(NAME_SCHEME)
            .or_else(|| uri.strip_prefix(LEGACY_NAME_SCHEME))
            .ok_or_else(|| NameError::MissingScheme(uri.to_string()))?;

        let path = path
            .strip_prefix('/')
            .ok_or_else(|| NameError::NotAbsolute(uri.to_string()))?;

        if path.is_empty() {
            return Ok(Self::root());
        }

        // A single trailing slash is tolerated ("ccnx:/a/b/")
        let path = path.strip_suffix('/').unwrap_or(path);
        Self::from_segments(path.split('/'))
    }

    /// Append a segment, returning the extended name.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, NameError> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Segments of this name.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// True for the root name.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix` matches the leading segments of this name.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", NAME_SCHEME)?;
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::parse(s)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Name::parse(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().expect("valid name")
    }

    #[test]
    fn test_parse_and_display() {
        let n = name("ccnx:/a/b/c");
        assert_eq!(n.segment_count(), 3);
        assert_eq!(n.to_string(), "ccnx:/a/b/c");
        assert_eq!(name("lci:/a/b").to_string(), "ccnx:/a/b");
        assert_eq!(name("ccnx:/a/b/"), name("ccnx:/a/b"));
    }

    #[test]
    fn test_root() {
        let root = name("ccnx:/");
        assert!(root.is_root());
        assert_eq!(root.to_string(), "ccnx:/");
        assert!(name("ccnx:/x").starts_with(&root));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Name::parse("/a/b"),
            Err(NameError::MissingScheme(_))
        ));
        assert!(matches!(
            Name::parse("ccnx:a/b"),
            Err(NameError::NotAbsolute(_))
        ));
        assert_eq!(Name::parse("ccnx:/a//b"), Err(NameError::EmptySegment(1)));
    }

    #[test]
    fn test_prefix_is_segment_wise() {
        let prefix = name("ccnx:/parc/sens");
        assert!(!name("ccnx:/parc/sensors").starts_with(&prefix));
        assert!(name("ccnx:/parc/sens/1").starts_with(&prefix));
        assert!(prefix.starts_with(&prefix));
    }

    #[test]
    fn test_ordering() {
        assert!(name("ccnx:/a") < name("ccnx:/a/b"));
        assert!(name("ccnx:/a/b") < name("ccnx:/b"));
    }

    #[test]
    fn test_child() {
        let n = name("ccnx:/a").child("b").expect("child");
        assert_eq!(n, name("ccnx:/a/b"));
        assert!(n.child("").is_err());
        assert_eq!(n.child("x/y"), Err(NameError::ReservedCharacter(2)));
    }

    #[test]
    fn test_serde_uri_form() {
        let json = serde_json::to_string(&name("ccnx:/a/b")).expect("serialize");
        assert_eq!(json, "\"ccnx:/a/b\"");
        let back: Name = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, name("ccnx:/a/b"));
    }
}
