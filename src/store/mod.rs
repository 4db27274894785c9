//! The Index Store: durable, transactional storage and the only surface
//! through which entities are read or written.
//!
//! Connection management follows the teacher's `Database::create`/`open`
//! PRAGMA application (`journal_mode=WAL`, `synchronous=NORMAL`), ported
//! from `sea-orm` to `rusqlite` since this Store speaks raw SQL. Write
//! access is serialized through a single connection guarded by a
//! `std::sync::Mutex` and driven via `tokio::task::spawn_blocking`, matching
//! §5's single-writer model; since the spec explicitly permits reads to
//! "share the same serialization" when the engine doesn't expose shared-read
//! transactions to the caller, reads go through the same connection rather
//! than a separate pool — WAL mode still lets SQLite itself interleave
//! physical reads under the hood.

mod applications;
mod emojis;
mod favorites;
mod files;
mod folders;
mod notes;
mod schema;
mod tags;
mod watched_folders;

pub use folders::FolderUpdate;
pub use schema::{get_meta, set_meta};
pub use watched_folders::{WatchedFolderInsert, WatchedFolderProgress};

use crate::cache::Cache;
use crate::domain::FileRecord;
use crate::error::IndexResult;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::info;

pub struct IndexStore {
    conn: Arc<StdMutex<Connection>>,
    cache: Cache<FileRecord>,
}

impl IndexStore {
    pub async fn open(path: &Path) -> IndexResult<Self> {
        Self::open_with_cache(path, 5000, Duration::from_secs(60)).await
    }

    pub async fn open_with_cache(
        path: &Path,
        cache_max_size: usize,
        cache_ttl: Duration,
    ) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> IndexResult<Connection> {
            let conn = Connection::open(&path)?;
            apply_pragmas(&conn)?;
            schema::run_migrations(&conn)?;
            info!(path = %path.display(), "index store opened");
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            cache: Cache::new(cache_max_size, cache_ttl),
        })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn)?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            cache: Cache::new(1000, Duration::from_secs(60)),
        })
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    /// Runs a blocking rusqlite closure against the shared connection
    /// off the async runtime, translating panics/errors into `IndexError`.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> IndexResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let result =
            tokio::task::spawn_blocking(move || -> rusqlite::Result<T> {
                let mut conn = conn.lock().expect("index store connection mutex poisoned");
                f(&mut conn)
            })
            .await??;
        Ok(result)
    }
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -16000;",
    )
}

/// JSON codec used by the flexible `upsert_file`/`get_file_with_metadata`
/// surface: nested arrays/objects are encoded to TEXT, and TEXT values that
/// look JSON-encoded (`{`/`[` prefix) are decoded back on read.
pub(crate) mod json_codec {
    use rusqlite::types::{ToSqlOutput, Value, ValueRef};
    use serde_json::Value as Json;

    pub fn encode(value: &Json) -> Value {
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Integer(*b as i64),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Real(n.as_f64().unwrap_or_default())
                }
            }
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(_) | Json::Object(_) => {
                Value::Text(serde_json::to_string(value).unwrap_or_default())
            }
        }
    }

    pub fn decode_text(text: &str) -> Json {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str(text) {
                return parsed;
            }
        }
        Json::String(text.to_string())
    }

    pub fn value_to_json(value: ValueRef<'_>) -> Json {
        match value {
            ValueRef::Null => Json::Null,
            ValueRef::Integer(i) => Json::Number(i.into()),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            ValueRef::Text(t) => decode_text(&String::from_utf8_lossy(t)),
            ValueRef::Blob(_) => Json::Null,
        }
    }

    pub fn to_sql_output(value: &Json) -> ToSqlOutput<'_> {
        ToSqlOutput::Owned(encode(value))
    }
}
