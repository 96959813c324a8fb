//! Composite resource identifiers such as `"<parentID>/<childID>"`.
//!
//! Child resources (for example a network interface on a bare-metal server)
//! are only addressable in the context of their parent, so their external ID
//! joins both segments. Parsing is strict: the number of segments is fixed
//! per resource kind and empty segments are rejected rather than truncated.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

const SEPARATOR: char = '/';

/// Errors raised while building or parsing a [`ResourceId`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IdentifierError {
    /// Raised when the segment count differs from what the kind expects.
    #[error("invalid composite id {raw:?}: expected {expected} segments, found {found}")]
    InvalidCompositeId {
        /// Input passed by the caller.
        raw: String,
        /// Segment count required by the resource kind.
        expected: usize,
        /// Segment count found in the input.
        found: usize,
    },
    /// Raised when any segment is empty.
    #[error("invalid composite id {raw:?}: segment {index} is empty")]
    EmptySegment {
        /// Input passed by the caller.
        raw: String,
        /// Zero-based index of the empty segment.
        index: usize,
    },
    /// Raised when a segment passed to a constructor contains the separator.
    #[error("identifier segment {segment:?} must not contain '/'")]
    InvalidSegment {
        /// Offending segment.
        segment: String,
    },
}

/// External identifier of a resource; one segment or a composite path.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResourceId {
    segments: Vec<String>,
}

impl ResourceId {
    /// Builds a single-segment identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when `id` is empty or contains a `/`.
    pub fn simple(id: impl Into<String>) -> Result<Self, IdentifierError> {
        Self::composite([id])
    }

    /// Builds an identifier from its segments.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::EmptySegment`] for empty segments and
    /// [`IdentifierError::InvalidSegment`] when a segment contains a `/`.
    pub fn composite<I, S>(segments: I) -> Result<Self, IdentifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(segment) = segments.iter().find(|segment| segment.contains(SEPARATOR)) {
            return Err(IdentifierError::InvalidSegment {
                segment: segment.clone(),
            });
        }
        let raw = segments.join("/");
        check_segments(&raw, &segments)?;
        Ok(Self { segments })
    }

    /// Parses `raw`, requiring exactly `expected` non-empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidCompositeId`] on a segment count
    /// mismatch and [`IdentifierError::EmptySegment`] for empty segments.
    pub fn parse(raw: &str, expected: usize) -> Result<Self, IdentifierError> {
        let segments: Vec<String> = raw.split(SEPARATOR).map(str::to_owned).collect();
        if segments.len() != expected {
            return Err(IdentifierError::InvalidCompositeId {
                raw: raw.to_owned(),
                expected,
                found: segments.len(),
            });
        }
        check_segments(raw, &segments)?;
        Ok(Self { segments })
    }

    /// Parses a `"<parentID>/<childID>"` pair.
    ///
    /// # Errors
    ///
    /// See [`ResourceId::parse`].
    pub fn parse_pair(raw: &str) -> Result<(String, String), IdentifierError> {
        let id = Self::parse(raw, 2)?;
        let mut segments = id.segments.into_iter();
        match (segments.next(), segments.next()) {
            (Some(parent), Some(child)) => Ok((parent, child)),
            _ => Err(IdentifierError::InvalidCompositeId {
                raw: raw.to_owned(),
                expected: 2,
                found: 0,
            }),
        }
    }

    /// Segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment (the parent for composite IDs).
    #[must_use]
    pub fn first(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Last segment (the child for composite IDs).
    #[must_use]
    pub fn last(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }
}

fn check_segments(raw: &str, segments: &[String]) -> Result<(), IdentifierError> {
    if segments.is_empty() {
        return Err(IdentifierError::InvalidCompositeId {
            raw: raw.to_owned(),
            expected: 1,
            found: 0,
        });
    }
    match segments.iter().position(String::is_empty) {
        Some(index) => Err(IdentifierError::EmptySegment {
            raw: raw.to_owned(),
            index,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{IdentifierError, ResourceId};

    #[test]
    fn parses_parent_and_child() {
        let pair = ResourceId::parse_pair("bms-123/nic-456")
            .unwrap_or_else(|err| panic!("pair should parse: {err}"));
        assert_eq!(pair, (String::from("bms-123"), String::from("nic-456")));
    }

    #[test]
    fn missing_separator_is_invalid_composite_id() {
        let err = ResourceId::parse_pair("bms-123").expect_err("single segment should fail");
        assert!(matches!(
            err,
            IdentifierError::InvalidCompositeId {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[rstest]
    #[case("/nic", 0)]
    #[case("bms/", 1)]
    fn empty_segments_are_rejected(#[case] raw: &str, #[case] index: usize) {
        let err = ResourceId::parse(raw, 2).expect_err("empty segment should fail");
        assert_eq!(
            err,
            IdentifierError::EmptySegment {
                raw: raw.to_owned(),
                index
            }
        );
    }

    #[test]
    fn extra_segments_are_not_truncated() {
        let err = ResourceId::parse("a/b/c", 2).expect_err("three segments should fail");
        assert!(matches!(
            err,
            IdentifierError::InvalidCompositeId { found: 3, .. }
        ));
    }

    #[test]
    fn composite_round_trips_through_display() {
        let id = ResourceId::composite(["cloud", "conn", "net"])
            .unwrap_or_else(|err| panic!("segments are valid: {err}"));
        let reparsed = ResourceId::parse(&id.to_string(), 3)
            .unwrap_or_else(|err| panic!("display output should parse: {err}"));
        assert_eq!(reparsed, id);
        assert_eq!(reparsed.segments().len(), 3);
    }

    #[test]
    fn composite_rejects_embedded_separator() {
        let err = ResourceId::composite(["a/b", "c"]).expect_err("slash in segment");
        assert!(matches!(err, IdentifierError::InvalidSegment { .. }));
    }
}
