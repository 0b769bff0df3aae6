//! SQLite-backed key store.
//!
//! Keys live in a single `ApiKeys` table. `short_token` carries a UNIQUE
//! constraint, which gives both the atomic uniqueness check on insert and the
//! index used by lookups. The database runs in WAL mode so the reader
//! connections are never blocked by the writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use api_key::SecretDigest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags, Row, ffi, params};
use uuid::Uuid;

use super::KeyStore;
use crate::error::{StoreError, StoreResult};
use crate::record::{ApiKeyRecord, Metadata};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ApiKeys (
    id TEXT PRIMARY KEY NOT NULL,
    short_token TEXT UNIQUE NOT NULL,
    long_secret_hash BLOB NOT NULL,
    namespace TEXT NOT NULL,
    version TEXT NOT NULL,
    display_name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    revoked BOOLEAN NOT NULL DEFAULT 0,
    metadata TEXT
);
"#;

const COLUMNS: &str = "id, short_token, long_secret_hash, namespace, version, display_name, \
                       created_at, expires_at, revoked, metadata";

const LOOKUP_SQL: &str = "SELECT id, short_token, long_secret_hash, namespace, version, \
                          display_name, created_at, expires_at, revoked, metadata \
                          FROM ApiKeys WHERE short_token = ?1";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause between reader retries while the database is locked.
const BUSY_RETRY: Duration = Duration::from_millis(5);

/// Default number of reader connections.
pub const DEFAULT_READ_CONNECTIONS: usize = 4;

/// Durable key store on a SQLite file.
///
/// Holds one writer connection and a fixed set of read-only connections
/// handed out round-robin. Every call runs on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteKeyStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Vec<Reader>,
    next_reader: AtomicUsize,
    next_call: AtomicU64,
}

impl Inner {
    fn next_reader(&self) -> usize {
        self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len()
    }
}

struct Reader {
    conn: Mutex<Connection>,
    interrupt: InterruptHandle,
    /// Call currently executing on `conn`, if any.
    running: Mutex<Option<u64>>,
}

impl Reader {
    fn new(conn: Connection) -> Self {
        let interrupt = conn.get_interrupt_handle();
        Self {
            conn: Mutex::new(conn),
            interrupt,
            running: Mutex::new(None),
        }
    }
}

/// Cancels a read when the caller stops waiting for it.
///
/// Dropped together with the future of [`SqliteKeyStore::read`]. A call that
/// has not started yet is skipped; a running statement is interrupted.
struct CancelOnDrop {
    inner: Arc<Inner>,
    reader: usize,
    call: u64,
    cancelled: Arc<AtomicBool>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        let reader = &self.inner.readers[self.reader];
        let running = reader.running.lock();
        if *running == Some(self.call) {
            reader.interrupt.interrupt();
        }
    }
}

impl std::fmt::Debug for SqliteKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKeyStore")
            .field("path", &self.inner.path)
            .field("readers", &self.inner.readers.len())
            .finish()
    }
}

impl SqliteKeyStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// In-memory paths are rejected: every connection would get its own
    /// empty database. Use [`MemoryKeyStore`](super::MemoryKeyStore) instead.
    pub fn open<P: AsRef<Path>>(path: P, read_connections: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if is_in_memory_path(&path) {
            return Err(StoreError::InMemoryPath(path));
        }

        let writer = Connection::open(&path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = writer.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            log::warn!("SQLite journal mode is {} instead of WAL for {:?}", mode, path);
        }
        writer.execute_batch("PRAGMA synchronous = NORMAL;")?;
        writer.execute_batch(SCHEMA)?;

        let readers = (0..read_connections.max(1))
            .map(|_| Self::open_reader(&path).map(Reader::new))
            .collect::<Result<Vec<_>, _>>()?;

        let count: i64 = writer.query_row("SELECT COUNT(*) FROM ApiKeys", [], |row| row.get(0))?;
        log::info!(
            "Opened API key store {:?} with {} keys and {} readers",
            path,
            count,
            readers.len()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                writer: Mutex::new(writer),
                readers,
                next_reader: AtomicUsize::new(0),
                next_call: AtomicU64::new(0),
            }),
        })
    }

    /// Open a read-only connection to the database.
    ///
    /// Readers have no busy handler; `read` retries instead, so a cancelled
    /// call stops waiting on the lock.
    fn open_reader(path: &Path) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::ZERO)?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of stored records, revoked and expired included.
    pub async fn len(&self) -> StoreResult<usize> {
        self.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM ApiKeys", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    /// Run `f` on a reader connection.
    ///
    /// Dropping the returned future cancels the work: a running statement is
    /// interrupted and the connection is released for the next caller.
    async fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop {
            inner: Arc::clone(&self.inner),
            reader: self.inner.next_reader(),
            call: self.inner.next_call.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::clone(&cancelled),
        };
        let (inner, index, call) = (Arc::clone(&self.inner), guard.reader, guard.call);

        tokio::task::spawn_blocking(move || {
            let reader = &inner.readers[index];
            let conn = reader.conn.lock();
            let started = Instant::now();
            loop {
                {
                    let mut running = reader.running.lock();
                    if cancelled.load(Ordering::Acquire) {
                        return Err(StoreError::Timeout);
                    }
                    *running = Some(call);
                }
                let result = f(&*conn);
                *reader.running.lock() = None;

                match result {
                    Err(ref err) if is_busy(err) && started.elapsed() < BUSY_TIMEOUT => {
                        std::thread::sleep(BUSY_RETRY);
                    }
                    Err(err) if is_interrupted(&err) => return Err(StoreError::Timeout),
                    other => return other,
                }
            }
        })
        .await?
    }

    async fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = inner.writer.lock();
            f(&*conn)
        })
        .await?
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn create(&self, record: ApiKeyRecord) -> StoreResult<Uuid> {
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                id: record.id.to_string(),
                reason: format!("metadata not serializable: {}", e),
            })?;

        self.write(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO ApiKeys ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    COLUMNS
                ),
                params![
                    record.id.to_string(),
                    record.short_token,
                    &record.long_secret_hash.as_bytes()[..],
                    record.namespace,
                    record.version,
                    record.display_name,
                    record.created_at.timestamp_millis(),
                    record.expires_at.map(|t| t.timestamp_millis()),
                    record.revoked,
                    metadata,
                ],
            );

            match inserted {
                Ok(_) => Ok(record.id),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Err(StoreError::DuplicateToken)
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    Err(StoreError::DuplicateId(record.id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_by_short_token(&self, short_token: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let short_token = short_token.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare_cached(LOOKUP_SQL)?;
            let mut rows = stmt.query([&short_token])?;
            match rows.next()? {
                Some(row) => record_from_row(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<ApiKeyRecord>> {
        let now_ms = now.timestamp_millis();
        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM ApiKeys \
                 WHERE revoked = 0 AND (expires_at IS NULL OR expires_at > ?1) \
                 ORDER BY created_at, id",
                COLUMNS
            ))?;
            let mut rows = stmt.query([now_ms])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(record_from_row(row)?);
            }
            Ok(records)
        })
        .await
    }

    async fn revoke(&self, id: Uuid) -> StoreResult<()> {
        self.write(move |conn| {
            let changed = conn.execute(
                "UPDATE ApiKeys SET revoked = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            ensure_changed(changed, id)
        })
        .await
    }

    async fn set_expiry(&self, id: Uuid, expires_at: Option<DateTime<Utc>>) -> StoreResult<()> {
        self.write(move |conn| {
            let changed = conn.execute(
                "UPDATE ApiKeys SET expires_at = ?1 WHERE id = ?2",
                params![expires_at.map(|t| t.timestamp_millis()), id.to_string()],
            )?;
            ensure_changed(changed, id)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.write(move |conn| {
            let changed = conn.execute("DELETE FROM ApiKeys WHERE id = ?1", [id.to_string()])?;
            ensure_changed(changed, id)
        })
        .await
    }
}

/// True for `:memory:` and `file:` URIs that name an in-memory database.
pub(crate) fn is_in_memory_path(path: &Path) -> bool {
    let path = path.to_string_lossy();
    if path == ":memory:" {
        return true;
    }
    path.starts_with("file:") && (path.contains(":memory:") || path.contains("mode=memory"))
}

fn sqlite_code(err: &StoreError) -> Option<ErrorCode> {
    match err {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => Some(e.code),
        _ => None,
    }
}

fn is_busy(err: &StoreError) -> bool {
    matches!(
        sqlite_code(err),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn is_interrupted(err: &StoreError) -> bool {
    sqlite_code(err) == Some(ErrorCode::OperationInterrupted)
}

fn ensure_changed(changed: usize, id: Uuid) -> StoreResult<()> {
    if changed == 0 {
        Err(StoreError::NotFound(id))
    } else {
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> StoreResult<ApiKeyRecord> {
    let raw_id: String = row.get(0)?;
    let corrupt = |reason: &str| StoreError::Corrupt {
        id: raw_id.clone(),
        reason: reason.to_string(),
    };

    let id = Uuid::parse_str(&raw_id).map_err(|_| corrupt("invalid id"))?;
    let hash: Vec<u8> = row.get(2)?;
    let long_secret_hash =
        SecretDigest::from_slice(&hash).ok_or_else(|| corrupt("invalid digest length"))?;
    let created_at = DateTime::from_timestamp_millis(row.get(6)?)
        .ok_or_else(|| corrupt("invalid created_at"))?;
    let expires_at = match row.get::<_, Option<i64>>(7)? {
        Some(ms) => {
            Some(DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt("invalid expires_at"))?)
        }
        None => None,
    };
    let metadata = match row.get::<_, Option<String>>(9)? {
        Some(json) => Some(
            serde_json::from_str::<Metadata>(&json).map_err(|_| corrupt("invalid metadata"))?,
        ),
        None => None,
    };

    Ok(ApiKeyRecord {
        id,
        short_token: row.get(1)?,
        long_secret_hash,
        namespace: row.get(3)?,
        version: row.get(4)?,
        display_name: row.get(5)?,
        created_at,
        expires_at,
        revoked: row.get(8)?,
        metadata,
    })
}
