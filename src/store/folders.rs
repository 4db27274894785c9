//! `folders` table operations: idempotent `update_folder`, and the
//! bottom-up/bubble-up count recomputation in `update_folder_counts`.
//!
//! Grounded on the same `upsert`-then-recompute shape `files.rs` uses, with
//! the recursive count walk following the "depth-first over `parent_path`"
//! rule from §4.1.

use super::IndexStore;
use crate::domain::FolderRecord;
use crate::error::IndexResult;
use rusqlite::{Connection, OptionalExtension, Row};

const SELECT_FOLDER_SQL: &str = "SELECT path, name, parent_path, modified_at, indexed_at, \
     direct_file_count, direct_child_count, total_file_count, total_child_count, \
     watched_folder_path FROM folders WHERE path = ?1";

fn row_to_folder(row: &Row<'_>) -> rusqlite::Result<FolderRecord> {
    Ok(FolderRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        parent_path: row.get(2)?,
        modified_at: row.get(3)?,
        indexed_at: row.get(4)?,
        direct_file_count: row.get(5)?,
        direct_child_count: row.get(6)?,
        total_file_count: row.get(7)?,
        total_child_count: row.get(8)?,
        watched_folder_path: row.get(9)?,
    })
}

/// The columns `update_folder` is allowed to set on insert/update. `path` is
/// always the key; counts are never supplied here, they're derived.
#[derive(Debug, Clone)]
pub struct FolderUpdate {
    pub name: String,
    pub parent_path: Option<String>,
    pub modified_at: i64,
    pub indexed_at: i64,
    pub watched_folder_path: String,
}

fn compute_direct_counts(conn: &Connection, path: &str) -> rusqlite::Result<(i64, i64)> {
    let direct_files: i64 = conn.query_row(
        "SELECT COUNT(*) FROM files WHERE folder_path = ?1",
        [path],
        |r| r.get(0),
    )?;
    let direct_children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM folders WHERE parent_path = ?1",
        [path],
        |r| r.get(0),
    )?;
    Ok((direct_files, direct_children))
}

/// Depth-first total count walk: `total_* = direct_* + Σ child.total_*`,
/// recursing into every child regardless of whether its own counts are
/// already current.
fn compute_total_counts(conn: &Connection, path: &str) -> rusqlite::Result<(i64, i64)> {
    let (mut total_files, mut total_children) = compute_direct_counts(conn, path)?;

    let mut stmt = conn.prepare_cached("SELECT path FROM folders WHERE parent_path = ?1")?;
    let child_paths: Vec<String> = stmt
        .query_map([path], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    for child in child_paths {
        let (child_files, child_children) = compute_total_counts(conn, &child)?;
        total_files += child_files;
        total_children += child_children;
    }
    Ok((total_files, total_children))
}

impl IndexStore {
    pub async fn get_folder(&self, path: &str) -> IndexResult<Option<FolderRecord>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_FOLDER_SQL, [&path], row_to_folder)
                .optional()
        })
        .await
    }

    /// Idempotent on `modified_at`: a no-op if the stored value already
    /// matches. Otherwise upserts the row and bubbles recomputed counts up
    /// through `update_folder_counts(parent_path)`.
    pub async fn update_folder(&self, path: &str, update: FolderUpdate) -> IndexResult<()> {
        let path_owned = path.to_string();
        let update_clone = update.clone();
        let unchanged = self
            .with_conn(move |conn| {
                let stored: Option<i64> = conn
                    .query_row(
                        "SELECT modified_at FROM folders WHERE path = ?1",
                        [&path_owned],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(stored == Some(update_clone.modified_at))
            })
            .await?;
        if unchanged {
            return Ok(());
        }

        let path_owned = path.to_string();
        let parent = update.parent_path.clone();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT INTO folders (path, name, parent_path, modified_at, indexed_at, \
                 direct_file_count, direct_child_count, total_file_count, total_child_count, \
                 watched_folder_path) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, 0, ?6) \
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name, \
                 parent_path = excluded.parent_path, modified_at = excluded.modified_at, \
                 indexed_at = excluded.indexed_at, watched_folder_path = excluded.watched_folder_path",
            )?
            .execute(rusqlite::params![
                path_owned,
                update.name,
                update.parent_path,
                update.modified_at,
                update.indexed_at,
                update.watched_folder_path,
            ])?;
            Ok(())
        })
        .await?;

        self.update_folder_counts(path).await?;
        if let Some(parent) = parent {
            if parent != path {
                Box::pin(self.update_folder_counts(&parent)).await?;
            }
        }
        Ok(())
    }

    /// Recomputes `direct_*` via direct queries and `total_*` via depth-first
    /// recursion over `folders` joined by `parent_path`, writes the result,
    /// then recurses to the parent unless the parent equals this path (root).
    pub async fn update_folder_counts(&self, path: &str) -> IndexResult<()> {
        let path_owned = path.to_string();
        let parent = self
            .with_conn(move |conn| {
                let (direct_files, direct_children) = compute_direct_counts(conn, &path_owned)?;
                let (total_files, total_children) = compute_total_counts(conn, &path_owned)?;
                conn.prepare_cached(
                    "UPDATE folders SET direct_file_count = ?1, direct_child_count = ?2, \
                     total_file_count = ?3, total_child_count = ?4 WHERE path = ?5",
                )?
                .execute(rusqlite::params![
                    direct_files,
                    direct_children,
                    total_files,
                    total_children,
                    path_owned,
                ])?;
                let parent: Option<String> = conn
                    .query_row(
                        "SELECT parent_path FROM folders WHERE path = ?1",
                        [&path_owned],
                        |r| r.get(0),
                    )
                    .optional()?
                    .flatten();
                Ok(parent)
            })
            .await?;

        if let Some(parent) = parent {
            if parent != path {
                Box::pin(self.update_folder_counts(&parent)).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::watched_folders::WatchedFolderInsert;

    async fn seed_tree(store: &IndexStore) {
        store
            .upsert_watched_folder(WatchedFolderInsert {
                path: "/R".to_string(),
                name: "R".to_string(),
                depth: crate::domain::Depth::Unlimited,
            })
            .await
            .unwrap();

        for (path, name, parent) in [
            ("/R", "R", None),
            ("/R/a", "a", Some("/R")),
            ("/R/b", "b", Some("/R")),
            ("/R/b/c", "c", Some("/R/b")),
        ] {
            store
                .update_folder(
                    path,
                    FolderUpdate {
                        name: name.to_string(),
                        parent_path: parent.map(|p: &str| p.to_string()),
                        modified_at: 1,
                        indexed_at: 1,
                        watched_folder_path: "/R".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let file_in = |folder: &str, name: &str| {
            let mut data = crate::domain::file::FileData::new();
            data.insert("name".into(), serde_json::json!(name));
            data.insert("folder_path".into(), serde_json::json!(folder));
            data.insert("size".into(), serde_json::json!(1));
            data
        };
        for (folder, name) in [
            ("/R/a", "a1.txt"),
            ("/R/a", "a2.txt"),
            ("/R/a", "a3.txt"),
            ("/R/b", "b1.txt"),
            ("/R/b/c", "c1.txt"),
            ("/R/b/c", "c2.txt"),
        ] {
            store
                .upsert_file(&format!("{folder}/{name}"), file_in(folder, name))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn recursive_counts_bubble_up_from_leaf() {
        let store = IndexStore::open_in_memory().unwrap();
        seed_tree(&store).await;

        store.update_folder_counts("/R/b/c").await.unwrap();

        let b = store.get_folder("/R/b").await.unwrap().unwrap();
        assert_eq!(b.total_file_count, 3);
        let root = store.get_folder("/R").await.unwrap().unwrap();
        assert_eq!(root.total_file_count, 6);
    }

    #[tokio::test]
    async fn update_folder_is_idempotent_on_modified_at() {
        let store = IndexStore::open_in_memory().unwrap();
        seed_tree(&store).await;
        let before = store.get_folder("/R/a").await.unwrap().unwrap();

        store
            .update_folder(
                "/R/a",
                FolderUpdate {
                    name: "renamed".to_string(),
                    parent_path: Some("/R".to_string()),
                    modified_at: 1,
                    indexed_at: 999,
                    watched_folder_path: "/R".to_string(),
                },
            )
            .await
            .unwrap();

        let after = store.get_folder("/R/a").await.unwrap().unwrap();
        assert_eq!(after.name, before.name, "no-op since modified_at matched");
    }
}
