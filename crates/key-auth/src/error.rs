//! Error types for storage, verification and issuing.

use std::path::PathBuf;

use api_key::ApiKeyError;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by a [`KeyStore`](crate::store::KeyStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same short token already exists.
    #[error("short token already exists")]
    DuplicateToken,

    /// A record with the same id already exists.
    #[error("api key id {0} already exists")]
    DuplicateId(Uuid),

    /// No record with the given id.
    #[error("api key {0} not found")]
    NotFound(Uuid),

    /// The read did not complete within the lookup timeout.
    #[error("storage read timed out")]
    Timeout,

    /// A persisted row could not be decoded.
    #[error("corrupt api key record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// The SQLite path names an in-memory database, which is not shared
    /// between connections.
    #[error("sqlite path {0:?} is in-memory; use the memory store instead")]
    InMemoryPath(PathBuf),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Detailed outcome of a failed verification.
///
/// This type distinguishes every failure and must stay inside the trust
/// boundary. Use [`VerifyError::into_public`] (or
/// [`Verifier::authenticate`](crate::verifier::Verifier::authenticate)) before
/// reporting to a client.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed api key: {0}")]
    MalformedKey(#[source] ApiKeyError),

    #[error("api key prefix is not accepted here")]
    WrongPrefix,

    #[error("no api key for short token")]
    NotFound,

    #[error("api key secret does not match")]
    VerificationFailed,

    #[error("api key revoked")]
    Revoked,

    #[error("api key expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl VerifyError {
    /// Collapse into what may cross the trust boundary.
    ///
    /// `NotFound`, `VerificationFailed` and `Revoked` always become
    /// [`AuthenticationError::Unauthenticated`]. `Expired` does too unless
    /// `reveal_expired` is set.
    pub fn into_public(self, reveal_expired: bool) -> AuthenticationError {
        match self {
            VerifyError::MalformedKey(_) | VerifyError::WrongPrefix => {
                AuthenticationError::MalformedKey
            }
            VerifyError::NotFound | VerifyError::VerificationFailed | VerifyError::Revoked => {
                AuthenticationError::Unauthenticated
            }
            VerifyError::Expired { .. } if reveal_expired => AuthenticationError::Expired,
            VerifyError::Expired { .. } => AuthenticationError::Unauthenticated,
            VerifyError::StorageUnavailable(_) => AuthenticationError::StorageUnavailable,
        }
    }
}

/// Authentication failure as seen by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// The presented string is not an API key. Safe to report.
    #[error("malformed api key")]
    MalformedKey,

    /// Unknown key, wrong secret, revoked, or (by default) expired.
    #[error("authentication failed")]
    Unauthenticated,

    /// Only produced when expiry is configured to be revealed.
    #[error("api key expired")]
    Expired,

    /// Transient backend failure; not a security decision.
    #[error("authentication backend unavailable")]
    StorageUnavailable,
}

impl AuthenticationError {
    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthenticationError::StorageUnavailable)
    }
}

/// Errors from issuing a new key.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid key format: {0}")]
    InvalidFormat(#[source] ApiKeyError),

    /// Entropy source failure. Fatal, never retried.
    #[error("entropy exhausted: {0}")]
    EntropyExhausted(#[source] ApiKeyError),

    /// Every attempt hit an existing short token.
    #[error("short token collided on all {attempts} attempts")]
    CollisionRetriesExhausted { attempts: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<ApiKeyError> for IssueError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::EntropyExhausted(_) => IssueError::EntropyExhausted(err),
            _ => IssueError::InvalidFormat(err),
        }
    }
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid key format: {0}")]
    Format(#[from] ApiKeyError),

    #[error("invalid config: {0}")]
    Invalid(String),
}
