//! `files` table operations: `upsert_file`, `batch_upsert_files`, the three
//! `get_file*` read paths, and `remove_path`.
//!
//! The ranked `CASE WHEN … END` idiom used by the Search Engine and the
//! `INSERT … ON CONFLICT DO UPDATE` upsert shape here are both grounded on
//! the retrieved launcher index service's `upsert_file`/search functions.

use super::json_codec;
use super::IndexStore;
use crate::domain::file::{Category, FileData, FILE_COLUMNS};
use crate::domain::FileRecord;
use crate::error::{IndexError, IndexResult};
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;

const FILE_ROW_COLUMNS: &[&str] = &[
    "path",
    "name",
    "folder_path",
    "size",
    "modified_at",
    "created_at",
    "accessed_at",
    "indexed_at",
    "mime_type",
    "sha256_hash",
    "file_type",
    "category",
];

const SELECT_FILE_SQL: &str = "SELECT path, name, folder_path, size, modified_at, created_at, \
     accessed_at, indexed_at, mime_type, sha256_hash, file_type, category FROM files WHERE path = ?1";

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let category: String = row.get(11)?;
    Ok(FileRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        folder_path: row.get(2)?,
        size: row.get(3)?,
        modified_at: row.get(4)?,
        created_at: row.get(5)?,
        accessed_at: row.get(6)?,
        indexed_at: row.get(7)?,
        mime_type: row.get(8)?,
        sha256_hash: row.get(9)?,
        file_type: row.get(10)?,
        category: Category::from_str(&category).unwrap_or(Category::Other),
    })
}

fn filter_known_columns(data: FileData) -> FileData {
    data.into_iter()
        .filter(|(key, _)| FILE_COLUMNS.contains(&key.as_str()))
        .collect()
}

fn build_upsert_sql(columns: &[String]) -> String {
    let col_list = std::iter::once("path".to_string())
        .chain(columns.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len() + 1)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let update_clauses = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO files ({col_list}) VALUES ({placeholders}) \
         ON CONFLICT(path) DO UPDATE SET {update_clauses}"
    )
}

fn bind_upsert(
    conn: &rusqlite::Connection,
    path: &str,
    columns: &[String],
    data: &FileData,
) -> rusqlite::Result<()> {
    let sql = build_upsert_sql(columns);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(columns.len() + 1);
    values.push(rusqlite::types::Value::Text(path.to_string()));
    for col in columns {
        values.push(json_codec::encode(&data[col]));
    }
    stmt.execute(rusqlite::params_from_iter(values.iter()))?;
    Ok(())
}

impl IndexStore {
    /// Inserts or updates a file row by `path`. `data` is a mapping whose
    /// keys are a subset of the file columns; unknown keys are dropped.
    /// Fails with `InvalidInput` if no known column remains.
    pub async fn upsert_file(&self, path: &str, data: FileData) -> IndexResult<()> {
        let valid = filter_known_columns(data);
        if valid.is_empty() {
            return Err(IndexError::InvalidInput(
                "upsert_file requires at least one known file column".to_string(),
            ));
        }
        let path_owned = path.to_string();
        self.with_conn(move |conn| {
            let columns: Vec<String> = valid.keys().cloned().collect();
            bind_upsert(conn, &path_owned, &columns, &valid)
        })
        .await?;
        self.cache.delete(path);
        Ok(())
    }

    /// Runs every upsert inside one transaction. Per-item validation errors
    /// (empty/malformed data) are collected and do not abort the batch;
    /// a genuine store-level failure rolls back the entire transaction.
    pub async fn batch_upsert_files(
        &self,
        items: Vec<(String, FileData)>,
    ) -> IndexResult<(usize, Vec<(String, IndexError)>)> {
        let result = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let mut success_count = 0usize;
                let mut errors = Vec::new();
                for (path, data) in items {
                    let valid = filter_known_columns(data);
                    if valid.is_empty() {
                        errors.push((
                            path,
                            IndexError::InvalidInput(
                                "upsert_file requires at least one known file column".to_string(),
                            ),
                        ));
                        continue;
                    }
                    let columns: Vec<String> = valid.keys().cloned().collect();
                    bind_upsert(&tx, &path, &columns, &valid)?;
                    success_count += 1;
                }
                tx.commit()?;
                Ok((success_count, errors))
            })
            .await?;

        for path in &result.1 {
            let _ = path; // per-item errors already carry the path; nothing to invalidate
        }
        Ok(result)
    }

    pub async fn get_file(&self, path: &str) -> IndexResult<Option<FileRecord>> {
        let path_owned = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_FILE_SQL, [&path_owned], row_to_file)
                .optional()
        })
        .await
    }

    /// Returns the full stored row as a JSON object, applying the
    /// JSON-decode-on-read rule uniformly across every column so round-trip
    /// fidelity holds for any value `upsert_file` was given.
    pub async fn get_file_with_metadata(&self, path: &str) -> IndexResult<Option<serde_json::Value>> {
        let path_owned = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_FILE_SQL, [&path_owned], |row| {
                let mut map = serde_json::Map::new();
                for (idx, column) in FILE_ROW_COLUMNS.iter().enumerate() {
                    let value_ref = row.get_ref(idx)?;
                    map.insert((*column).to_string(), json_codec::value_to_json(value_ref));
                }
                Ok(serde_json::Value::Object(map))
            })
            .optional()
        })
        .await
    }

    /// Consults the LRU+TTL cache first; a miss populates it.
    pub async fn get_cached_file(&self, path: &str) -> IndexResult<Option<FileRecord>> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(Some(cached));
        }
        let found = self.get_file(path).await?;
        if let Some(record) = &found {
            self.cache.set(path, record.clone());
        }
        Ok(found)
    }

    /// Deletes files with `path = ?` OR `folder_path = ?`, then deletes the
    /// folder row at `path` itself if its subtree is now empty. Notes are
    /// preserved. Cache keys with `path` as a prefix are invalidated.
    pub async fn remove_path(&self, path: &str) -> IndexResult<()> {
        let path_owned = path.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM files WHERE path = ?1 OR folder_path = ?1",
                [&path_owned],
            )?;
            let remaining_files: i64 = tx.query_row(
                "SELECT COUNT(*) FROM files WHERE folder_path = ?1",
                [&path_owned],
                |r| r.get(0),
            )?;
            let remaining_subfolders: i64 = tx.query_row(
                "SELECT COUNT(*) FROM folders WHERE parent_path = ?1",
                [&path_owned],
                |r| r.get(0),
            )?;
            if remaining_files == 0 && remaining_subfolders == 0 {
                tx.execute("DELETE FROM folders WHERE path = ?1", [&path_owned])?;
            }
            tx.commit()
        })
        .await?;
        self.cache.delete_by_prefix(path);
        Ok(())
    }

    /// Every indexed file path, read for orphan cleanup's full-table sweep.
    pub async fn list_file_paths(&self) -> IndexResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT path FROM files")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Batched form of `remove_path`: every path is removed inside a single
    /// transaction, used by the live Watcher to apply a coalesced batch of
    /// filesystem-remove events atomically.
    pub async fn remove_paths(&self, paths: Vec<String>) -> IndexResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let paths_clone = paths.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for path in &paths_clone {
                tx.execute("DELETE FROM files WHERE path = ?1 OR folder_path = ?1", [path])?;
                let remaining_files: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM files WHERE folder_path = ?1",
                    [path],
                    |r| r.get(0),
                )?;
                let remaining_subfolders: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM folders WHERE parent_path = ?1",
                    [path],
                    |r| r.get(0),
                )?;
                if remaining_files == 0 && remaining_subfolders == 0 {
                    tx.execute("DELETE FROM folders WHERE path = ?1", [path])?;
                }
            }
            tx.commit()
        })
        .await?;
        for path in &paths {
            self.cache.delete_by_prefix(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(pairs: &[(&str, serde_json::Value)]) -> FileData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_file(
                "/a/b.txt",
                data(&[
                    ("name", json!("b.txt")),
                    ("folder_path", json!("/a")),
                    ("size", json!(42)),
                    ("modified_at", json!(10)),
                    ("created_at", json!(10)),
                    ("accessed_at", json!(10)),
                    ("indexed_at", json!(10)),
                    ("category", json!("document")),
                ]),
            )
            .await
            .unwrap();

        let file = store.get_file("/a/b.txt").await.unwrap().unwrap();
        assert_eq!(file.name, "b.txt");
        assert_eq!(file.size, 42);
        assert_eq!(file.category, Category::Document);
    }

    #[tokio::test]
    async fn upsert_with_no_known_columns_is_invalid() {
        let store = IndexStore::open_in_memory().unwrap();
        let err = store
            .upsert_file("/a/b.txt", data(&[("bogus", json!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn batch_upsert_commits_successful_items_despite_one_bad_item() {
        let store = IndexStore::open_in_memory().unwrap();
        let (count, errors) = store
            .batch_upsert_files(vec![
                ("/a".to_string(), data(&[("name", json!("a")), ("size", json!(1))])),
                ("/b".to_string(), data(&[("bogus", json!(1))])),
                ("/c".to_string(), data(&[("name", json!("c")), ("size", json!(3))])),
            ])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(errors.len(), 1);
        assert!(store.get_file("/a").await.unwrap().is_some());
        assert!(store.get_file("/c").await.unwrap().is_some());
        assert!(store.get_file("/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_cached_file_populates_cache_on_miss() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_file("/a", data(&[("name", json!("a")), ("size", json!(1))]))
            .await
            .unwrap();
        assert_eq!(store.cache_stats().size, 0);
        store.get_cached_file("/a").await.unwrap();
        assert_eq!(store.cache_stats().size, 1);
    }

    #[tokio::test]
    async fn remove_path_invalidates_prefixed_cache_entries() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_file("/a", data(&[("name", json!("a")), ("size", json!(1))]))
            .await
            .unwrap();
        store.get_cached_file("/a").await.unwrap();
        store.remove_path("/a").await.unwrap();
        assert!(store.get_cached_file("/a").await.unwrap().is_none());
    }
}
