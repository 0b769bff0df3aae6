//! In-memory key store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::KeyStore;
use crate::error::{StoreError, StoreResult};
use crate::record::ApiKeyRecord;

/// Thread-safe in-memory store.
///
/// Records are keyed by short token with a reverse id index. Inserts check
/// and insert under a single write lock, so racing creates cannot both win.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Short token -> record
    by_token: HashMap<String, ApiKeyRecord>,
    /// Id -> short token
    token_by_id: HashMap<Uuid, String>,
}

impl Inner {
    fn record_mut(&mut self, id: Uuid) -> StoreResult<&mut ApiKeyRecord> {
        let token = self.token_by_id.get(&id).ok_or(StoreError::NotFound(id))?;
        self.by_token
            .get_mut(token)
            .ok_or(StoreError::NotFound(id))
    }
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, revoked and expired included.
    pub fn len(&self) -> usize {
        self.inner.read().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn create(&self, record: ApiKeyRecord) -> StoreResult<Uuid> {
        let mut inner = self.inner.write();

        if inner.by_token.contains_key(&record.short_token) {
            return Err(StoreError::DuplicateToken);
        }
        if inner.token_by_id.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }

        let id = record.id;
        inner.token_by_id.insert(id, record.short_token.clone());
        inner.by_token.insert(record.short_token.clone(), record);
        Ok(id)
    }

    async fn get_by_short_token(&self, short_token: &str) -> StoreResult<Option<ApiKeyRecord>> {
        Ok(self.inner.read().by_token.get(short_token).cloned())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<ApiKeyRecord>> {
        let inner = self.inner.read();
        let mut active: Vec<ApiKeyRecord> = inner
            .by_token
            .values()
            .filter(|record| record.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by_key(|record| (record.created_at, record.id));
        Ok(active)
    }

    async fn revoke(&self, id: Uuid) -> StoreResult<()> {
        self.inner.write().record_mut(id)?.revoked = true;
        Ok(())
    }

    async fn set_expiry(&self, id: Uuid, expires_at: Option<DateTime<Utc>>) -> StoreResult<()> {
        self.inner.write().record_mut(id)?.expires_at = expires_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let token = inner
            .token_by_id
            .remove(&id)
            .ok_or(StoreError::NotFound(id))?;
        inner.by_token.remove(&token);
        Ok(())
    }
}
