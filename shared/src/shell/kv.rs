use async_trait::async_trait;
use crux_kv::error::KeyValueError;
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ShellError;
use crate::capabilities::{KvError, StorageErrorCode, MAX_VALUE_SIZE};
use crate::get_current_time_ms;

/// Byte storage under the core's namespaced keys (`session:token`, ...).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Returns the value it replaced.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError>;

    /// Returns the value it removed.
    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// Answers one `crux_kv` request from `store`.
pub(crate) async fn execute<K: KvStore + ?Sized>(store: &K, operation: &KeyValueOperation) -> KeyValueResult {
    let outcome = match operation {
        KeyValueOperation::Get { key } => store.get(key).await.map(|value| KeyValueResponse::Get {
            value: wire_value(value),
        }),
        KeyValueOperation::Set { key, value } => match check_size(value.len()) {
            Ok(()) => store.set(key, value.clone()).await.map(|previous| KeyValueResponse::Set {
                previous: wire_value(previous),
            }),
            Err(e) => Err(e),
        },
        KeyValueOperation::Delete { key } => store.delete(key).await.map(|previous| KeyValueResponse::Delete {
            previous: wire_value(previous),
        }),
        KeyValueOperation::Exists { key } => store
            .exists(key)
            .await
            .map(|is_present| KeyValueResponse::Exists { is_present }),
        KeyValueOperation::ListKeys { prefix, cursor } => store.keys(prefix).await.map(|keys| {
            let skip = usize::try_from(*cursor).unwrap_or(usize::MAX);
            KeyValueResponse::ListKeys {
                keys: keys.into_iter().skip(skip).collect(),
                next_cursor: 0,
            }
        }),
    };

    match outcome {
        Ok(response) => KeyValueResult::Ok { response },
        Err(e) => {
            warn!(error = %e, "kv operation failed");
            KeyValueResult::Err {
                error: KeyValueError::Io { message: e.to_string() },
            }
        }
    }
}

fn wire_value(value: Option<Vec<u8>>) -> Value {
    value.map_or(Value::None, Value::Bytes)
}

fn check_size(size: usize) -> Result<(), KvError> {
    if size > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size,
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.lock().await.insert(key.to_string(), value))
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.lock().await.remove(key))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

fn storage_error(e: &rusqlite::Error) -> KvError {
    let code = match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) => StorageErrorCode::Busy,
        Some(rusqlite::ErrorCode::DatabaseLocked) => StorageErrorCode::Locked,
        Some(rusqlite::ErrorCode::DiskFull) => StorageErrorCode::DiskFull,
        Some(rusqlite::ErrorCode::PermissionDenied | rusqlite::ErrorCode::ReadOnly) => {
            StorageErrorCode::PermissionDenied
        }
        Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
            StorageErrorCode::Corrupted
        }
        Some(rusqlite::ErrorCode::SystemIoFailure) => StorageErrorCode::IoError,
        _ => StorageErrorCode::Unknown,
    };
    KvError::storage(code, e.to_string())
}

/// Durable store backed by a single SQLite table.
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShellError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ShellError::Storage(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| ShellError::Storage(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ShellError> {
        let conn = Connection::open_in_memory().map_err(|e| ShellError::Storage(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ShellError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| ShellError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        conn.query_row("SELECT value FROM kv_entries WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| storage_error(&e))
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let conn = self.conn.lock().await;
        Self::read(&conn, key)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, KvError> {
        let conn = self.conn.lock().await;
        let previous = Self::read(&conn, key)?;
        let now = i64::try_from(get_current_time_ms()).unwrap_or(i64::MAX);
        debug!(key, bytes = value.len(), "kv write");
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .map_err(|e| storage_error(&e))?;
        Ok(previous)
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let conn = self.conn.lock().await;
        let previous = Self::read(&conn, key)?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .map_err(|e| storage_error(&e))?;
        Ok(previous)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM kv_entries WHERE key = ?1)",
            params![key],
            |row| row.get(0),
        )
        .map_err(|e| storage_error(&e))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT key FROM kv_entries ORDER BY key")
            .map_err(|e| storage_error(&e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| storage_error(&e))?;
        let mut keys = Vec::new();
        for key in rows {
            let key = key.map_err(|e| storage_error(&e))?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_reports_previous_values() {
        let store = MemoryKvStore::new();
        assert_eq!(store.set("session:token", b"abc".to_vec()).await.unwrap(), None);
        assert_eq!(
            store.set("session:token", b"def".to_vec()).await.unwrap(),
            Some(b"abc".to_vec())
        );
        store.set("settings:preferences", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.keys("session:").await.unwrap(), vec!["session:token".to_string()]);
        assert_eq!(store.delete("session:token").await.unwrap(), Some(b"def".to_vec()));
        assert!(!store.exists("session:token").await.unwrap());
    }

    #[tokio::test]
    async fn test_crux_requests_are_answered() {
        let store = MemoryKvStore::new();
        let set = KeyValueOperation::Set {
            key: "session:token".into(),
            value: b"jwt".to_vec(),
        };
        assert_eq!(
            execute(&store, &set).await,
            KeyValueResult::Ok {
                response: KeyValueResponse::Set { previous: Value::None }
            }
        );

        let get = KeyValueOperation::Get {
            key: "session:token".into(),
        };
        assert_eq!(
            execute(&store, &get).await,
            KeyValueResult::Ok {
                response: KeyValueResponse::Get {
                    value: Value::Bytes(b"jwt".to_vec())
                }
            }
        );

        let oversized = KeyValueOperation::Set {
            key: "settings:preferences".into(),
            value: vec![0u8; MAX_VALUE_SIZE + 1],
        };
        assert!(matches!(execute(&store, &oversized).await, KeyValueResult::Err { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kv.sqlite");

        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("session:token", b"secret".to_vec()).await.unwrap();
        }

        let store = SqliteKvStore::open(&path).unwrap();
        assert_eq!(store.get("session:token").await.unwrap(), Some(b"secret".to_vec()));
        assert!(store.exists("session:token").await.unwrap());
        assert_eq!(store.keys("session:").await.unwrap(), vec!["session:token".to_string()]);

        assert_eq!(store.delete("session:token").await.unwrap(), Some(b"secret".to_vec()));
        assert_eq!(store.delete("session:token").await.unwrap(), None);
        assert!(!store.exists("session:token").await.unwrap());
    }
}
