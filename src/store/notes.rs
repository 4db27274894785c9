//! `notes` table operations: upsert-or-delete-on-empty, target-type
//! inference, and orphan detection.

use super::IndexStore;
use crate::domain::note::TargetType;
use crate::domain::Note;
use crate::error::{IndexError, IndexResult};
use rusqlite::OptionalExtension;

impl IndexStore {
    /// Upserts `content` for `(path, target_type)`, or deletes the row if
    /// `content` is empty. `target_type` is inferred when absent by
    /// consulting files, then folders, then emojis; an `emoji:/…` path whose
    /// emoji row doesn't exist yet gets one created automatically.
    pub async fn set_notes(
        &self,
        path: &str,
        content: &str,
        target_type: Option<TargetType>,
        updated_at: i64,
    ) -> IndexResult<()> {
        let target_type = match target_type {
            Some(t) => t,
            None => self.infer_target_type(path).await?,
        };

        if target_type == TargetType::Emoji {
            let char = path
                .strip_prefix(crate::domain::emoji::EMOJI_PATH_PREFIX)
                .unwrap_or(path);
            self.ensure_emoji(char).await?;
        }

        if content.is_empty() {
            let path = path.to_string();
            let type_str = target_type.to_string();
            self.with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM notes WHERE target_path = ?1 AND target_type = ?2",
                    rusqlite::params![path, type_str],
                )?;
                Ok(())
            })
            .await
        } else {
            let path = path.to_string();
            let type_str = target_type.to_string();
            let content = content.to_string();
            self.with_conn(move |conn| {
                conn.prepare_cached(
                    "INSERT INTO notes (target_path, target_type, content, updated_at) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(target_path, target_type) DO UPDATE SET \
                     content = excluded.content, updated_at = excluded.updated_at",
                )?
                .execute(rusqlite::params![path, type_str, content, updated_at])?;
                Ok(())
            })
            .await
        }
    }

    pub async fn get_notes(&self, path: &str, target_type: Option<TargetType>) -> IndexResult<Option<Note>> {
        let target_type = match target_type {
            Some(t) => t,
            None => self.infer_target_type(path).await?,
        };
        let path = path.to_string();
        let type_str = target_type.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT target_path, target_type, content, updated_at FROM notes \
                 WHERE target_path = ?1 AND target_type = ?2",
                rusqlite::params![path, type_str],
                |row| {
                    let type_str: String = row.get(1)?;
                    Ok(Note {
                        target_path: row.get(0)?,
                        target_type: type_str.parse().unwrap_or(TargetType::File),
                        content: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Consults files, then folders, then emojis, in that order.
    async fn infer_target_type(&self, path: &str) -> IndexResult<TargetType> {
        if path.starts_with(crate::domain::emoji::EMOJI_PATH_PREFIX) {
            return Ok(TargetType::Emoji);
        }
        if self.get_file(path).await?.is_some() {
            return Ok(TargetType::File);
        }
        if self.get_folder(path).await?.is_some() {
            return Ok(TargetType::Folder);
        }
        if self.get_emoji(path).await?.is_some() {
            return Ok(TargetType::Emoji);
        }
        Err(IndexError::NotFound(format!(
            "cannot infer note target type for unknown path: {path}"
        )))
    }

    /// Returns notes whose `target_path` no longer exists in the
    /// corresponding table (files/folders are removed by index maintenance,
    /// emojis are never removed so they never orphan a note).
    pub async fn get_orphaned_notes(&self) -> IndexResult<Vec<Note>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT target_path, target_type, content, updated_at FROM notes n \
                 WHERE (n.target_type = 'file' AND NOT EXISTS \
                        (SELECT 1 FROM files f WHERE f.path = n.target_path)) \
                    OR (n.target_type = 'folder' AND NOT EXISTS \
                        (SELECT 1 FROM folders fo WHERE fo.path = n.target_path)) \
                    OR (n.target_type = 'emoji' AND NOT EXISTS \
                        (SELECT 1 FROM emojis e WHERE e.path = n.target_path))",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let type_str: String = row.get(1)?;
                    Ok(Note {
                        target_path: row.get(0)?,
                        target_type: type_str.parse().unwrap_or(TargetType::File),
                        content: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_notes_infers_type_from_existing_file() {
        let store = IndexStore::open_in_memory().unwrap();
        let mut data = crate::domain::file::FileData::new();
        data.insert("name".into(), json!("a.txt"));
        store.upsert_file("/a.txt", data).await.unwrap();

        store.set_notes("/a.txt", "hello", None, 1).await.unwrap();
        let note = store.get_notes("/a.txt", None).await.unwrap().unwrap();
        assert_eq!(note.target_type, TargetType::File);
        assert_eq!(note.content, "hello");
    }

    #[tokio::test]
    async fn setting_empty_content_deletes_the_row() {
        let store = IndexStore::open_in_memory().unwrap();
        store
            .set_notes("/a", "hi", Some(TargetType::File), 1)
            .await
            .unwrap();
        store
            .set_notes("/a", "", Some(TargetType::File), 2)
            .await
            .unwrap();
        assert!(store
            .get_notes("/a", Some(TargetType::File))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn note_on_emoji_path_auto_creates_the_emoji_row() {
        let store = IndexStore::open_in_memory().unwrap();
        let path = crate::domain::emoji::emoji_path("🎉");
        store.set_notes(&path, "party note", None, 1).await.unwrap();
        assert!(store.get_emoji(&path).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn orphaned_notes_are_detected_after_removal() {
        let store = IndexStore::open_in_memory().unwrap();
        let mut data = crate::domain::file::FileData::new();
        data.insert("name".into(), json!("a.txt"));
        store.upsert_file("/a.txt", data).await.unwrap();
        store.set_notes("/a.txt", "hello", None, 1).await.unwrap();

        store.remove_path("/a.txt").await.unwrap();

        let orphans = store.get_orphaned_notes().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].target_path, "/a.txt");
    }
}
