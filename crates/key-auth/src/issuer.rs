//! Minting and persisting new API keys.

use std::fmt;
use std::sync::Arc;

use api_key::{GeneratedKey, KeyFormat, generate, hash_secret};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{IssueError, StoreError};
use crate::record::{ApiKeyRecord, Metadata, now_millis};
use crate::store::KeyStore;

/// Attempts before a short token collision is reported to the caller.
pub const MAX_CREATE_ATTEMPTS: usize = 3;

/// Source of fresh key material.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, format: &KeyFormat) -> api_key::Result<GeneratedKey>;
}

/// Draws from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    fn generate(&self, format: &KeyFormat) -> api_key::Result<GeneratedKey> {
        generate(format)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueRequest {
    pub display_name: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<Metadata>,
}

impl IssueRequest {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A freshly issued key.
///
/// `key` is the only copy of the full key string; it cannot be recovered from
/// the store afterwards.
pub struct IssuedKey {
    pub key: Zeroizing<String>,
    pub record: ApiKeyRecord,
}

impl fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKey")
            .field("key", &"[REDACTED]")
            .field("record", &self.record)
            .finish()
    }
}

pub struct KeyIssuer {
    store: Arc<dyn KeyStore>,
    format: KeyFormat,
    generator: Box<dyn KeyGenerator>,
}

impl fmt::Debug for KeyIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyIssuer")
            .field("format", &self.format)
            .finish()
    }
}

impl KeyIssuer {
    /// Fails if `format` has an invalid label.
    pub fn new(store: Arc<dyn KeyStore>, format: KeyFormat) -> Result<Self, IssueError> {
        format.validate().map_err(IssueError::InvalidFormat)?;
        Ok(Self {
            store,
            format,
            generator: Box::new(OsKeyGenerator),
        })
    }

    pub fn with_generator(mut self, generator: impl KeyGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    pub fn format(&self) -> &KeyFormat {
        &self.format
    }

    /// Generate a key, hash its secret and persist the record.
    ///
    /// A short token collision regenerates the whole key, up to
    /// [`MAX_CREATE_ATTEMPTS`] times. An entropy failure is returned at once.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedKey, IssueError> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let generated = self.generator.generate(&self.format)?;
            let record = ApiKeyRecord {
                id: Uuid::now_v7(),
                short_token: generated.short_token.clone(),
                long_secret_hash: hash_secret(&generated.long_secret),
                namespace: self.format.namespace.clone(),
                version: self.format.version.clone(),
                display_name: request.display_name.clone(),
                created_at: now_millis(),
                expires_at: request.expires_at,
                revoked: false,
                metadata: request.metadata.clone(),
            };

            match self.store.create(record.clone()).await {
                Ok(_) => {
                    log::info!(
                        "Issued API key {} ({}) in namespace {}",
                        record.id,
                        record.short_token,
                        record.namespace
                    );
                    return Ok(IssuedKey {
                        key: generated.key,
                        record,
                    });
                }
                Err(StoreError::DuplicateToken) => {
                    log::warn!(
                        "Short token collision on attempt {}/{}",
                        attempt,
                        MAX_CREATE_ATTEMPTS
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(IssueError::CollisionRetriesExhausted {
            attempts: MAX_CREATE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;
    use api_key::{ApiKeyError, Secret, parse, verify_parsed};
    use parking_lot::Mutex;

    /// Replays a fixed sequence of short tokens.
    struct ScriptedGenerator {
        tokens: Mutex<Vec<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(tokens: &[&'static str]) -> Self {
            let mut tokens = tokens.to_vec();
            tokens.reverse();
            Self {
                tokens: Mutex::new(tokens),
            }
        }
    }

    impl KeyGenerator for ScriptedGenerator {
        fn generate(&self, format: &KeyFormat) -> api_key::Result<GeneratedKey> {
            let short_token = self.tokens.lock().pop().unwrap_or("zzzzzzzzzzzzzzzz");
            let fresh = generate(format)?;
            let key = api_key::encode(
                &format.prefix,
                &format.namespace,
                &format.version,
                short_token,
                fresh.long_secret.expose(),
            );
            Ok(GeneratedKey {
                key: Zeroizing::new(key),
                short_token: short_token.to_string(),
                long_secret: Secret::new(fresh.long_secret.expose().to_string()),
            })
        }
    }

    struct BrokenEntropy;

    impl KeyGenerator for BrokenEntropy {
        fn generate(&self, _: &KeyFormat) -> api_key::Result<GeneratedKey> {
            Err(ApiKeyError::EntropyExhausted(rand::Error::new(
                std::io::Error::other("no entropy"),
            )))
        }
    }

    fn format() -> KeyFormat {
        KeyFormat::new("sk").with_namespace("mono")
    }

    #[tokio::test]
    async fn test_issue_persists_hash_only() {
        let store = Arc::new(MemoryKeyStore::new());
        let issuer = KeyIssuer::new(store.clone(), format()).unwrap();
        let issued = issuer.issue(IssueRequest::new("ci")).await.unwrap();

        let parsed = parse(&issued.key).unwrap();
        assert_eq!(parsed.namespace, "mono");
        assert_eq!(parsed.short_token, issued.record.short_token);

        let stored = store
            .get_by_short_token(&parsed.short_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, issued.record);
        assert!(verify_parsed(&parsed, &stored.long_secret_hash));
        assert!(!format!("{:?}", issued).contains(parsed.long_secret().expose()));
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let store = Arc::new(MemoryKeyStore::new());
        let first = KeyIssuer::new(store.clone(), format())
            .unwrap()
            .with_generator(ScriptedGenerator::new(&["aaaaaaaaaaaaaaaa"]));
        first.issue(IssueRequest::new("first")).await.unwrap();

        let second = KeyIssuer::new(store.clone(), format())
            .unwrap()
            .with_generator(ScriptedGenerator::new(&[
                "aaaaaaaaaaaaaaaa",
                "bbbbbbbbbbbbbbbb",
            ]));
        let issued = second.issue(IssueRequest::new("second")).await.unwrap();
        assert_eq!(issued.record.short_token, "bbbbbbbbbbbbbbbb");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_collision_retries_exhausted() {
        let store = Arc::new(MemoryKeyStore::new());
        let seed = KeyIssuer::new(store.clone(), format())
            .unwrap()
            .with_generator(ScriptedGenerator::new(&["aaaaaaaaaaaaaaaa"]));
        seed.issue(IssueRequest::new("seed")).await.unwrap();

        let issuer = KeyIssuer::new(store.clone(), format())
            .unwrap()
            .with_generator(ScriptedGenerator::new(&["aaaaaaaaaaaaaaaa"; 5]));
        let result = issuer.issue(IssueRequest::new("loser")).await;
        assert!(matches!(
            result,
            Err(IssueError::CollisionRetriesExhausted {
                attempts: MAX_CREATE_ATTEMPTS
            })
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_entropy_failure_not_retried() {
        let store = Arc::new(MemoryKeyStore::new());
        let issuer = KeyIssuer::new(store.clone(), format())
            .unwrap()
            .with_generator(BrokenEntropy);
        assert!(matches!(
            issuer.issue(IssueRequest::new("x")).await,
            Err(IssueError::EntropyExhausted(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_format_rejected() {
        let store = Arc::new(MemoryKeyStore::new());
        let result = KeyIssuer::new(store, KeyFormat::new("s-k"));
        assert!(matches!(result, Err(IssueError::InvalidFormat(_))));
    }
}
