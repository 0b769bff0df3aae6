//! Parsing and encoding of the external key string.
//!
//! Grammar: `<prefix>-<namespace>-<version>-<short_token>-<long_secret>`,
//! every segment ASCII alphanumeric. Parsing is plain string decomposition:
//! no I/O, no hashing.

use crate::config::{MAX_LABEL_LEN, is_label};
use crate::error::{Malformed, Result, Segment};
use crate::secret::Secret;
use crate::token::{LONG_SECRET_LEN, SHORT_TOKEN_LEN};

/// Segment delimiter. Never valid inside a segment.
pub const DELIMITER: char = '-';

/// Upper bound on a well-formed key string, checked before splitting.
pub const MAX_KEY_LEN: usize = 3 * MAX_LABEL_LEN + SHORT_TOKEN_LEN + LONG_SECRET_LEN + 4;

/// Components of a presented key string.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedKey {
    pub prefix: String,
    pub namespace: String,
    pub version: String,
    pub short_token: String,
    long_secret: Secret,
}

impl ParsedKey {
    /// The long secret. Hash it; do not store or log it.
    pub fn long_secret(&self) -> &Secret {
        &self.long_secret
    }

    /// Rebuild the external key string.
    pub fn to_key_string(&self) -> String {
        encode(
            &self.prefix,
            &self.namespace,
            &self.version,
            &self.short_token,
            self.long_secret.expose(),
        )
    }
}

/// Join five segments into an external key string.
pub fn encode(
    prefix: &str,
    namespace: &str,
    version: &str,
    short_token: &str,
    long_secret: &str,
) -> String {
    let mut key = String::with_capacity(
        prefix.len() + namespace.len() + version.len() + short_token.len() + long_secret.len() + 4,
    );
    for (i, segment) in [prefix, namespace, version, short_token, long_secret]
        .into_iter()
        .enumerate()
    {
        if i > 0 {
            key.push(DELIMITER);
        }
        key.push_str(segment);
    }
    key
}

/// Parse a key string into its components.
///
/// # Returns
/// * `ParsedKey` with all five segments
/// * `ApiKeyError::Malformed` if the delimiter count, a segment length or the
///   character set is wrong
pub fn parse(key: &str) -> Result<ParsedKey> {
    if key.len() > MAX_KEY_LEN {
        return Err(Malformed::TooLong { max: MAX_KEY_LEN }.into());
    }

    let parts: Vec<&str> = key.split(DELIMITER).collect();
    let [prefix, namespace, version, short_token, long_secret] = parts.as_slice() else {
        return Err(Malformed::SegmentCount { found: parts.len() }.into());
    };

    check_label(Segment::Prefix, prefix)?;
    check_label(Segment::Namespace, namespace)?;
    check_label(Segment::Version, version)?;
    check_fixed(Segment::ShortToken, short_token, SHORT_TOKEN_LEN)?;
    check_fixed(Segment::LongSecret, long_secret, LONG_SECRET_LEN)?;

    Ok(ParsedKey {
        prefix: prefix.to_string(),
        namespace: namespace.to_string(),
        version: version.to_string(),
        short_token: short_token.to_string(),
        long_secret: Secret::new(long_secret.to_string()),
    })
}

fn check_label(segment: Segment, value: &str) -> Result<()> {
    if is_label(value) {
        return Ok(());
    }
    if value.is_empty() || value.len() > MAX_LABEL_LEN {
        Err(Malformed::Length { segment }.into())
    } else {
        Err(Malformed::Character { segment }.into())
    }
}

fn check_fixed(segment: Segment, value: &str, len: usize) -> Result<()> {
    if value.len() != len {
        return Err(Malformed::Length { segment }.into());
    }
    if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Malformed::Character { segment }.into());
    }
    Ok(())
}
