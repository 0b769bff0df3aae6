//! Error types for API key operations.

use std::fmt;

use thiserror::Error;

/// One of the five segments of an external key string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Prefix,
    Namespace,
    Version,
    ShortToken,
    LongSecret,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Prefix => "prefix",
            Segment::Namespace => "namespace",
            Segment::Version => "version",
            Segment::ShortToken => "short token",
            Segment::LongSecret => "long secret",
        };
        f.write_str(name)
    }
}

/// Why a presented key string does not match the key grammar.
///
/// None of the variants carry segment contents, so the message is safe to
/// return to a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("key exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("expected 5 segments, found {found}")]
    SegmentCount { found: usize },

    #[error("{segment} has invalid length")]
    Length { segment: Segment },

    #[error("{segment} contains non-alphanumeric characters")]
    Character { segment: Segment },
}

/// Errors that can occur during API key operations.
#[derive(Debug, Error)]
pub enum ApiKeyError {
    /// Presented key does not parse.
    #[error("malformed key: {0}")]
    Malformed(#[from] Malformed),

    /// A key format label (prefix, namespace, version) is unusable.
    #[error("invalid {segment} {value:?}: expected 1-{max} ASCII alphanumeric characters")]
    InvalidSegment {
        segment: Segment,
        value: String,
        max: usize,
    },

    /// The OS random source failed. Fatal for key generation.
    #[error("entropy source exhausted: {0}")]
    EntropyExhausted(#[source] rand::Error),
}

/// Result type alias for API key operations.
pub type Result<T> = std::result::Result<T, ApiKeyError>;
