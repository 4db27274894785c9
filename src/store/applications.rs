//! `applications` table operations, including the system-application
//! reset/favorite-restore pair from §4.1: resetting drops every row with
//! `is_custom_added = 0`, and favorites on those rows are preserved across
//! the reset by exporting them first and restoring by `path` then `name`.

use super::IndexStore;
use crate::domain::application::FavoriteRecord;
use crate::domain::Application;
use crate::error::IndexResult;
use rusqlite::{OptionalExtension, Row};

const SELECT_APPLICATION_SQL: &str = "SELECT path, name, display_name, description, keywords, \
     categories, icon, last_updated, application_type, is_system, is_custom_added, is_favorite, \
     favorite_added_at FROM applications WHERE path = ?1";

fn row_to_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    let keywords: String = row.get(4)?;
    let categories: String = row.get(5)?;
    Ok(Application {
        path: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        keywords: serde_json::from_str(&keywords).unwrap_or_default(),
        categories: serde_json::from_str(&categories).unwrap_or_default(),
        icon: row.get(6)?,
        last_updated: row.get(7)?,
        application_type: row.get(8)?,
        is_system: row.get::<_, i64>(9)? != 0,
        is_custom_added: row.get::<_, i64>(10)? != 0,
        is_favorite: row.get::<_, i64>(11)? != 0,
        favorite_added_at: row.get(12)?,
    })
}

impl IndexStore {
    pub async fn upsert_application(&self, app: Application) -> IndexResult<()> {
        self.with_conn(move |conn| {
            let keywords = serde_json::to_string(&app.keywords).unwrap_or_else(|_| "[]".into());
            let categories = serde_json::to_string(&app.categories).unwrap_or_else(|_| "[]".into());
            conn.prepare_cached(
                "INSERT INTO applications (path, name, display_name, description, keywords, \
                 categories, icon, last_updated, application_type, is_system, is_custom_added, \
                 is_favorite, favorite_added_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name, \
                 display_name = excluded.display_name, description = excluded.description, \
                 keywords = excluded.keywords, categories = excluded.categories, \
                 icon = excluded.icon, last_updated = excluded.last_updated, \
                 application_type = excluded.application_type, is_system = excluded.is_system, \
                 is_custom_added = excluded.is_custom_added",
            )?
            .execute(rusqlite::params![
                app.path,
                app.name,
                app.display_name,
                app.description,
                keywords,
                categories,
                app.icon,
                app.last_updated,
                app.application_type,
                app.is_system as i64,
                app.is_custom_added as i64,
                app.is_favorite as i64,
                app.favorite_added_at,
            ])?;
            Ok(())
        })
        .await
    }

    /// Convenience wrapper for platform-discovery callers inserting
    /// system (non-custom) applications during a rescan.
    pub async fn insert_system_application(&self, mut app: Application) -> IndexResult<()> {
        app.is_system = true;
        app.is_custom_added = false;
        self.upsert_application(app).await
    }

    pub async fn get_application(&self, path: &str) -> IndexResult<Option<Application>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_APPLICATION_SQL, [&path], row_to_application)
                .optional()
        })
        .await
    }

    pub async fn list_applications(&self) -> IndexResult<Vec<Application>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT path, name, display_name, description, keywords, categories, icon, \
                 last_updated, application_type, is_system, is_custom_added, is_favorite, \
                 favorite_added_at FROM applications",
            )?;
            let rows = stmt
                .query_map([], row_to_application)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn set_application_favorite(
        &self,
        path: &str,
        is_favorite: bool,
        favorite_added_at: Option<i64>,
    ) -> IndexResult<()> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "UPDATE applications SET is_favorite = ?1, favorite_added_at = ?2 WHERE path = ?3",
            )?
            .execute(rusqlite::params![is_favorite as i64, favorite_added_at, path])?;
            Ok(())
        })
        .await
    }

    /// Exports every favorited system (non-custom) application so its
    /// favorite status survives `reset_system_applications`.
    pub async fn get_system_app_favorites(&self) -> IndexResult<Vec<FavoriteRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT path, name, favorite_added_at FROM applications \
                 WHERE is_custom_added = 0 AND is_favorite = 1",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FavoriteRecord {
                        path: row.get(0)?,
                        name: row.get(1)?,
                        favorite_added_at: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Deletes every row with `is_custom_added = 0`. Caller is expected to
    /// have exported favorites via `get_system_app_favorites` beforehand and
    /// to restore them after reinserting the fresh system set.
    pub async fn reset_system_applications(&self) -> IndexResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM applications WHERE is_custom_added = 0", [])?;
            Ok(())
        })
        .await
    }

    /// Restores favorites saved before a reset. Matches by `path` first,
    /// falling back to `name` (a rescan may assign a fresh path to what is
    /// semantically the same application), and only against rows that are
    /// not already favorited, preserving `favorite_added_at`.
    pub async fn restore_system_app_favorites(
        &self,
        favorites: Vec<FavoriteRecord>,
    ) -> IndexResult<usize> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut restored = 0usize;
            for fav in favorites {
                let updated = tx
                    .prepare_cached(
                        "UPDATE applications SET is_favorite = 1, favorite_added_at = ?1 \
                         WHERE path = ?2 AND is_favorite = 0",
                    )?
                    .execute(rusqlite::params![fav.favorite_added_at, fav.path])?;
                if updated > 0 {
                    restored += 1;
                    continue;
                }
                let updated = tx
                    .prepare_cached(
                        "UPDATE applications SET is_favorite = 1, favorite_added_at = ?1 \
                         WHERE name = ?2 AND is_favorite = 0",
                    )?
                    .execute(rusqlite::params![fav.favorite_added_at, fav.name])?;
                if updated > 0 {
                    restored += 1;
                }
            }
            tx.commit()?;
            Ok(restored)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(path: &str, name: &str, is_custom: bool, is_favorite: bool, favorite_added_at: Option<i64>) -> Application {
        Application {
            path: path.to_string(),
            name: name.to_string(),
            display_name: name.to_string(),
            description: None,
            keywords: vec![],
            categories: vec![],
            icon: None,
            last_updated: 0,
            application_type: None,
            is_system: !is_custom,
            is_custom_added: is_custom,
            is_favorite,
            favorite_added_at,
        }
    }

    #[tokio::test]
    async fn favorites_survive_a_system_reset_and_path_change() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .upsert_application(app("/A", "A", false, true, Some(100)))
            .await
            .unwrap();
        store
            .upsert_application(app("/B", "B", false, false, None))
            .await
            .unwrap();

        let favorites = store.get_system_app_favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].path, "/A");
        assert_eq!(favorites[0].favorite_added_at, Some(100));

        store.reset_system_applications().await.unwrap();
        assert!(store.get_application("/A").await.unwrap().is_none());

        store
            .upsert_application(app("/A2", "A", false, false, None))
            .await
            .unwrap();
        store
            .upsert_application(app("/B", "B", false, false, None))
            .await
            .unwrap();

        let restored = store.restore_system_app_favorites(favorites).await.unwrap();
        assert_eq!(restored, 1);

        let a2 = store.get_application("/A2").await.unwrap().unwrap();
        assert!(a2.is_favorite);
        assert_eq!(a2.favorite_added_at, Some(100));
        let b = store.get_application("/B").await.unwrap().unwrap();
        assert!(!b.is_favorite);
    }
}
