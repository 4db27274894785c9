//! Generic favorite toggling for paths of any target kind.
//!
//! Applications and emojis already carry their own dedicated `is_favorite`
//! column (`set_application_favorite`/`set_emoji_favorite`); this module is
//! the File/Folder counterpart, backed by a path-addressed `favorites` table
//! mirroring the `notes` target-type-inference pattern, plus a facade over
//! all four kinds so a caller addressing a bare path never has to know which
//! storage a favorite actually lives in.

use super::IndexStore;
use crate::domain::note::TargetType;
use crate::error::{IndexError, IndexResult};
use std::collections::HashMap;

impl IndexStore {
    /// Marks `path` as favorited, auto-detecting whether it addresses a
    /// file, folder, application, or emoji.
    pub async fn favorites_add(&self, path: &str, favorite_added_at: i64) -> IndexResult<()> {
        self.set_favorite(path, true, Some(favorite_added_at)).await
    }

    pub async fn favorites_remove(&self, path: &str) -> IndexResult<()> {
        self.set_favorite(path, false, None).await
    }

    /// Batched favorite lookup across every target kind in a single query
    /// per backing table, returned keyed by the input path. Paths that
    /// don't resolve to any known entity are simply absent from favorites
    /// checks rather than erroring, unlike `favorites_add`/`_remove`.
    pub async fn favorites_batch_check(
        &self,
        paths: &[String],
    ) -> IndexResult<HashMap<String, bool>> {
        if paths.is_empty() {
            return Ok(HashMap::new());
        }
        let paths = paths.to_vec();
        self.with_conn(move |conn| {
            let mut result: HashMap<String, bool> =
                paths.iter().map(|p| (p.clone(), false)).collect();

            let placeholders = (1..=paths.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");

            let favorites_sql = format!(
                "SELECT target_path FROM favorites WHERE target_path IN ({placeholders})"
            );
            let mut stmt = conn.prepare_cached(&favorites_sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(paths.iter()),
                |row| row.get::<_, String>(0),
            )?;
            for row in rows {
                result.insert(row?, true);
            }

            let applications_sql = format!(
                "SELECT path FROM applications WHERE is_favorite = 1 AND path IN ({placeholders})"
            );
            let mut stmt = conn.prepare_cached(&applications_sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(paths.iter()),
                |row| row.get::<_, String>(0),
            )?;
            for row in rows {
                result.insert(row?, true);
            }

            let emojis_sql = format!(
                "SELECT path FROM emojis WHERE is_favorite = 1 AND path IN ({placeholders})"
            );
            let mut stmt = conn.prepare_cached(&emojis_sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(paths.iter()),
                |row| row.get::<_, String>(0),
            )?;
            for row in rows {
                result.insert(row?, true);
            }

            Ok(result)
        })
        .await
    }

    async fn set_favorite(
        &self,
        path: &str,
        is_favorite: bool,
        favorite_added_at: Option<i64>,
    ) -> IndexResult<()> {
        match self.infer_favorite_target(path).await? {
            FavoriteTarget::Application => {
                self.set_application_favorite(path, is_favorite, favorite_added_at)
                    .await
            }
            FavoriteTarget::Emoji => {
                let char = path
                    .strip_prefix(crate::domain::emoji::EMOJI_PATH_PREFIX)
                    .unwrap_or(path);
                self.set_emoji_favorite(char, is_favorite, favorite_added_at)
                    .await
            }
            FavoriteTarget::Path(target_type) => {
                let path = path.to_string();
                let type_str = target_type.to_string();
                if is_favorite {
                    let favorite_added_at = favorite_added_at.unwrap_or(0);
                    self.with_conn(move |conn| {
                        conn.prepare_cached(
                            "INSERT INTO favorites (target_path, target_type, favorite_added_at) \
                             VALUES (?1, ?2, ?3) \
                             ON CONFLICT(target_path, target_type) DO UPDATE SET \
                             favorite_added_at = excluded.favorite_added_at",
                        )?
                        .execute(rusqlite::params![path, type_str, favorite_added_at])?;
                        Ok(())
                    })
                    .await
                } else {
                    self.with_conn(move |conn| {
                        conn.execute(
                            "DELETE FROM favorites WHERE target_path = ?1 AND target_type = ?2",
                            rusqlite::params![path, type_str],
                        )?;
                        Ok(())
                    })
                    .await
                }
            }
        }
    }

    /// Applications take priority over a same-path file/folder match since
    /// they carry their own dedicated favorite column; emoji paths are
    /// recognized by prefix before any table lookup.
    async fn infer_favorite_target(&self, path: &str) -> IndexResult<FavoriteTarget> {
        if path.starts_with(crate::domain::emoji::EMOJI_PATH_PREFIX) {
            return Ok(FavoriteTarget::Emoji);
        }
        if self.get_application(path).await?.is_some() {
            return Ok(FavoriteTarget::Application);
        }
        if self.get_file(path).await?.is_some() {
            return Ok(FavoriteTarget::Path(TargetType::File));
        }
        if self.get_folder(path).await?.is_some() {
            return Ok(FavoriteTarget::Path(TargetType::Folder));
        }
        Err(IndexError::NotFound(format!(
            "cannot infer favorite target for unknown path: {path}"
        )))
    }
}

enum FavoriteTarget {
    Application,
    Emoji,
    Path(TargetType),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::file::FileData;
    use serde_json::json;

    #[tokio::test]
    async fn favoriting_a_file_is_visible_through_all_items() {
        let store = IndexStore::open_in_memory().unwrap();
        let mut data = FileData::new();
        data.insert("name".into(), json!("a.txt"));
        store.upsert_file("/a.txt", data).await.unwrap();

        store.favorites_add("/a.txt", 42).await.unwrap();
        let checked = store
            .favorites_batch_check(&["/a.txt".to_string(), "/missing".to_string()])
            .await
            .unwrap();
        assert_eq!(checked.get("/a.txt"), Some(&true));
        assert_eq!(checked.get("/missing"), Some(&false));

        store.favorites_remove("/a.txt").await.unwrap();
        let checked = store
            .favorites_batch_check(&["/a.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(checked.get("/a.txt"), Some(&false));
    }

    #[tokio::test]
    async fn favoriting_a_folder_works_independently_of_files() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_watched_folder(crate::store::WatchedFolderInsert {
                path: "/root".to_string(),
                name: "root".to_string(),
                depth: crate::domain::watched_folder::Depth::Unlimited,
            })
            .await
            .unwrap();
        store
            .update_folder(
                "/root/sub",
                crate::store::FolderUpdate {
                    name: "sub".to_string(),
                    parent_path: Some("/root".to_string()),
                    modified_at: 0,
                    indexed_at: 0,
                    watched_folder_path: "/root".to_string(),
                },
            )
            .await
            .unwrap();

        store.favorites_add("/root/sub", 1).await.unwrap();
        let checked = store
            .favorites_batch_check(&["/root/sub".to_string()])
            .await
            .unwrap();
        assert_eq!(checked.get("/root/sub"), Some(&true));
    }

    #[tokio::test]
    async fn favoriting_an_unknown_path_errors() {
        let store = IndexStore::open_in_memory().unwrap();
        assert!(store.favorites_add("/nowhere", 1).await.is_err());
    }
}
