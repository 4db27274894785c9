//! `watched_folders` table operations. Deleting a row here CASCADEs (via the
//! `folders.watched_folder_path` foreign key) to every file/folder carrying
//! that root, per §3's CASCADE invariant; `files` has no such FK since a
//! file's `folder_path` always resolves through a `folders` row first.

use super::IndexStore;
use crate::domain::watched_folder::Depth;
use crate::domain::WatchedFolder;
use crate::error::IndexResult;
use rusqlite::{OptionalExtension, Row};

const SELECT_WATCHED_FOLDER_SQL: &str = "SELECT path, name, total_files, processed_files, \
     last_indexed, last_modified, depth FROM watched_folders WHERE path = ?1";

fn row_to_watched_folder(row: &Row<'_>) -> rusqlite::Result<WatchedFolder> {
    let depth: i64 = row.get(6)?;
    Ok(WatchedFolder {
        path: row.get(0)?,
        name: row.get(1)?,
        total_files: row.get(2)?,
        processed_files: row.get(3)?,
        last_indexed: row.get(4)?,
        last_modified: row.get(5)?,
        depth: Depth::from_db(depth),
    })
}

pub struct WatchedFolderInsert {
    pub path: String,
    pub name: String,
    pub depth: Depth,
}

/// Progress counters updated as a Watcher's scan advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchedFolderProgress {
    pub total_files: i64,
    pub processed_files: i64,
    pub last_indexed: Option<i64>,
    pub last_modified: Option<i64>,
}

impl IndexStore {
    pub async fn upsert_watched_folder(&self, insert: WatchedFolderInsert) -> IndexResult<()> {
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT INTO watched_folders (path, name, total_files, processed_files, depth) \
                 VALUES (?1, ?2, 0, 0, ?3) \
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name, depth = excluded.depth",
            )?
            .execute(rusqlite::params![insert.path, insert.name, insert.depth.to_db()])?;
            Ok(())
        })
        .await
    }

    pub async fn get_watched_folder(&self, path: &str) -> IndexResult<Option<WatchedFolder>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_WATCHED_FOLDER_SQL, [&path], row_to_watched_folder)
                .optional()
        })
        .await
    }

    pub async fn list_watched_folders(&self) -> IndexResult<Vec<WatchedFolder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT path, name, total_files, processed_files, last_indexed, last_modified, \
                 depth FROM watched_folders",
            )?;
            let rows = stmt
                .query_map([], row_to_watched_folder)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn update_watched_folder_progress(
        &self,
        path: &str,
        progress: WatchedFolderProgress,
    ) -> IndexResult<()> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "UPDATE watched_folders SET total_files = ?1, processed_files = ?2, \
                 last_indexed = ?3, last_modified = ?4 WHERE path = ?5",
            )?
            .execute(rusqlite::params![
                progress.total_files,
                progress.processed_files,
                progress.last_indexed,
                progress.last_modified,
                path,
            ])?;
            Ok(())
        })
        .await
    }

    /// Deletes the `watched_folders` row; files and folders carrying this
    /// root CASCADE-delete via the foreign key. Notes are untouched (they
    /// key off target paths directly, not the watched-folder relationship).
    pub async fn remove_watched_folder(&self, path: &str) -> IndexResult<()> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM watched_folders WHERE path = ?1", [&path])?;
            Ok(())
        })
        .await?;
        self.cache.delete_by_prefix(&path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::folders::FolderUpdate;

    #[tokio::test]
    async fn removing_watched_folder_cascades_to_its_subtree() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_watched_folder(WatchedFolderInsert {
                path: "/root".to_string(),
                name: "root".to_string(),
                depth: Depth::Unlimited,
            })
            .await
            .unwrap();
        store
            .update_folder(
                "/root",
                FolderUpdate {
                    name: "root".to_string(),
                    parent_path: None,
                    modified_at: 1,
                    indexed_at: 1,
                    watched_folder_path: "/root".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(store.get_folder("/root").await.unwrap().is_some());
        store.remove_watched_folder("/root").await.unwrap();
        assert!(store.get_folder("/root").await.unwrap().is_none());
    }
}
