//! Persisted API key records and the authenticated principal.

use std::collections::BTreeMap;

use api_key::SecretDigest;
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Caller-supplied attributes attached to a key. Opaque to this crate.
pub type Metadata = BTreeMap<String, String>;

/// An issued API key as stored.
///
/// Holds the digest of the long secret, never the secret itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,
    /// Non-secret lookup index, unique across all keys.
    pub short_token: String,
    /// SHA3-256 digest of the long secret.
    pub long_secret_hash: SecretDigest,
    pub namespace: String,
    pub version: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the key never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub metadata: Option<Metadata>,
}

impl ApiKeyRecord {
    /// True once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Neither revoked nor expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            key_id: self.id,
            namespace: self.namespace.clone(),
            display_name: self.display_name.clone(),
            metadata: self.metadata.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Identity returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub key_id: Uuid,
    /// Tenant namespace the key was issued for.
    pub namespace: String,
    pub display_name: String,
    pub metadata: Option<Metadata>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Current time at the millisecond precision used for persisted timestamps.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
