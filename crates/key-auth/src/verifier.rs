//! Authentication of presented API keys.
//!
//! One pass per call: parse, look up by short token, compare digests in
//! constant time, then check revocation and expiry. Nothing is retained
//! between calls.

use std::sync::Arc;
use std::time::Duration;

use api_key::{LONG_SECRET_LEN, Secret, SecretDigest, hash_secret, parse, verify_parsed};
use chrono::{DateTime, Utc};

use crate::error::{AuthenticationError, StoreError, VerifyError};
use crate::record::Principal;
use crate::store::KeyStore;

/// Default bound on the store read.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Only keys with this prefix are accepted.
    pub prefix: String,
    /// Upper bound on the store read. Exceeding it is a transient failure.
    pub lookup_timeout: Duration,
    /// Report expired keys as [`AuthenticationError::Expired`] instead of the
    /// generic failure. Only enable this for callers already known to own the
    /// key.
    pub reveal_expired: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            prefix: "sk".to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            reveal_expired: false,
        }
    }
}

impl VerifierConfig {
    /// Accept keys with `prefix`, using the default timeout and hiding expiry.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_reveal_expired(mut self, reveal: bool) -> Self {
        self.reveal_expired = reveal;
        self
    }
}

/// Stateless authenticator over a [`KeyStore`].
///
/// Cheap to share behind an `Arc`; every call is independent.
pub struct Verifier {
    store: Arc<dyn KeyStore>,
    config: VerifierConfig,
    /// Compared against when the short token is unknown, so that path does
    /// the same hashing work as a wrong secret.
    decoy: SecretDigest,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .finish()
    }
}

impl Verifier {
    pub fn new(store: Arc<dyn KeyStore>, config: VerifierConfig) -> Self {
        let decoy = hash_secret(&Secret::new("0".repeat(LONG_SECRET_LEN)));
        Self {
            store,
            config,
            decoy,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Authenticate a presented key for the transport layer.
    ///
    /// Unknown keys, wrong secrets and revoked keys all produce
    /// [`AuthenticationError::Unauthenticated`]; so do expired keys unless
    /// `reveal_expired` is set. Malformed input and storage failures are
    /// reported distinctly.
    pub async fn authenticate(&self, presented: &str) -> Result<Principal, AuthenticationError> {
        self.verify(presented).await.map_err(|err| {
            if let VerifyError::StorageUnavailable(ref source) = err {
                log::warn!("API key lookup failed: {}", source);
            }
            err.into_public(self.config.reveal_expired)
        })
    }

    /// Verify a presented key and report exactly why it was rejected.
    ///
    /// The error detail must not be shown to untrusted callers; see
    /// [`Verifier::authenticate`].
    pub async fn verify(&self, presented: &str) -> Result<Principal, VerifyError> {
        self.verify_at(presented, Utc::now()).await
    }

    /// [`Verifier::verify`] with an explicit clock.
    pub async fn verify_at(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal, VerifyError> {
        // Parse before touching storage.
        let parsed = parse(presented).map_err(VerifyError::MalformedKey)?;
        if parsed.prefix != self.config.prefix {
            return Err(VerifyError::WrongPrefix);
        }

        // Exactly one store read. Dropping this future cancels it.
        let lookup = self.store.get_by_short_token(&parsed.short_token);
        let record = match tokio::time::timeout(self.config.lookup_timeout, lookup).await {
            Ok(Ok(record)) => record,
            Ok(Err(err)) => return Err(VerifyError::StorageUnavailable(err)),
            Err(_) => return Err(VerifyError::StorageUnavailable(StoreError::Timeout)),
        };

        let stored = record
            .as_ref()
            .map_or(&self.decoy, |record| &record.long_secret_hash);
        let matched = verify_parsed(&parsed, stored);

        let Some(record) = record else {
            log::debug!("Rejected API key: unknown short token");
            return Err(VerifyError::NotFound);
        };
        if !matched || record.namespace != parsed.namespace || record.version != parsed.version {
            log::debug!("Rejected API key {}: secret mismatch", record.id);
            return Err(VerifyError::VerificationFailed);
        }

        if record.revoked {
            log::debug!("Rejected API key {}: revoked", record.id);
            return Err(VerifyError::Revoked);
        }
        if let Some(expired_at) = record.expires_at.filter(|&t| t <= now) {
            log::debug!("Rejected API key {}: expired at {}", record.id, expired_at);
            return Err(VerifyError::Expired { expired_at });
        }

        Ok(record.principal())
    }
}
