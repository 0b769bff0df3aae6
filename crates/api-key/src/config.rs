//! Key format labels used for generation.

use crate::error::{ApiKeyError, Result, Segment};

/// Maximum length of the prefix, namespace and version labels.
pub const MAX_LABEL_LEN: usize = 32;

/// The non-random part of a key: which class, tenant and scheme version it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormat {
    /// Key class, e.g. "sk" for secret keys.
    pub prefix: String,
    /// Tenant namespace, e.g. "mono".
    pub namespace: String,
    /// Scheme version, e.g. "v1".
    pub version: String,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self {
            prefix: "sk".to_string(),
            namespace: "default".to_string(),
            version: "v1".to_string(),
        }
    }
}

impl KeyFormat {
    /// Create a format for the given prefix with the default namespace and
    /// version.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Set the tenant namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the scheme version label.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Check every label against the key grammar.
    pub fn validate(&self) -> Result<()> {
        check_label(Segment::Prefix, &self.prefix)?;
        check_label(Segment::Namespace, &self.namespace)?;
        check_label(Segment::Version, &self.version)?;
        Ok(())
    }
}

fn check_label(segment: Segment, value: &str) -> Result<()> {
    if is_label(value) {
        Ok(())
    } else {
        Err(ApiKeyError::InvalidSegment {
            segment,
            value: value.to_string(),
            max: MAX_LABEL_LEN,
        })
    }
}

/// True when `value` is 1..=MAX_LABEL_LEN ASCII alphanumeric characters.
pub(crate) fn is_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_LABEL_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
}
