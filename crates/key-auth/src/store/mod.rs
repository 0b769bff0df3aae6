//! Durable, indexed storage of API key records.

mod memory;
mod sqlite;

pub use memory::MemoryKeyStore;
pub(crate) use sqlite::is_in_memory_path;
pub use sqlite::{DEFAULT_READ_CONNECTIONS, SqliteKeyStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::record::ApiKeyRecord;

/// Storage contract for API keys.
///
/// Implementations must enforce `short_token` uniqueness atomically on insert
/// and must serve [`KeyStore::get_by_short_token`] from an index, never a
/// scan. All methods are safe to call concurrently.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with [`StoreError::DuplicateToken`](crate::StoreError::DuplicateToken)
    /// if the short token is taken; the existing record is left untouched.
    async fn create(&self, record: ApiKeyRecord) -> StoreResult<Uuid>;

    /// Look up a record by its short token. This is the authentication hot
    /// path.
    async fn get_by_short_token(&self, short_token: &str) -> StoreResult<Option<ApiKeyRecord>>;

    /// All records that are neither revoked nor expired at `now`.
    ///
    /// For administration and reporting. Cost is linear in the number of
    /// keys; do not use it to authenticate.
    async fn list_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<ApiKeyRecord>>;

    /// Set the revocation flag.
    async fn revoke(&self, id: Uuid) -> StoreResult<()>;

    /// Replace `expires_at` (extend, shorten, or clear).
    async fn set_expiry(&self, id: Uuid, expires_at: Option<DateTime<Utc>>) -> StoreResult<()>;

    /// Hard-delete a record.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}
