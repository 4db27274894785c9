//! `tags`/`file_tags` operations: get-or-create by name and the many-to-many
//! join `filtered_search`'s `tags` filter reads.

use super::IndexStore;
use crate::domain::Tag;
use crate::error::IndexResult;
use rusqlite::OptionalExtension;

impl IndexStore {
    pub async fn get_or_create_tag(&self, name: &str) -> IndexResult<Tag> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.prepare_cached("INSERT OR IGNORE INTO tags (name) VALUES (?1)")?
                .execute([&name])?;
            conn.query_row("SELECT id, name FROM tags WHERE name = ?1", [&name], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
        })
        .await
    }

    pub async fn get_tag(&self, name: &str) -> IndexResult<Option<Tag>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT id, name FROM tags WHERE name = ?1", [&name], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()
        })
        .await
    }

    pub async fn list_tags(&self) -> IndexResult<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT id, name FROM tags ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn add_file_tag(&self, file_path: &str, tag_name: &str) -> IndexResult<()> {
        let tag = self.get_or_create_tag(tag_name).await?;
        let file_path = file_path.to_string();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO file_tags (file_path, tag_id) VALUES (?1, ?2)",
            )?
            .execute(rusqlite::params![file_path, tag.id])?;
            Ok(())
        })
        .await
    }

    pub async fn remove_file_tag(&self, file_path: &str, tag_name: &str) -> IndexResult<()> {
        let file_path = file_path.to_string();
        let tag_name = tag_name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM file_tags WHERE file_path = ?1 AND tag_id = \
                 (SELECT id FROM tags WHERE name = ?2)",
                rusqlite::params![file_path, tag_name],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_tags_for_file(&self, file_path: &str) -> IndexResult<Vec<Tag>> {
        let file_path = file_path.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT t.id, t.name FROM tags t \
                 JOIN file_tags ft ON ft.tag_id = t.id \
                 WHERE ft.file_path = ?1 ORDER BY t.name",
            )?;
            let rows = stmt
                .query_map([&file_path], |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
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

    #[tokio::test]
    async fn get_or_create_tag_is_idempotent() {
        let store = IndexStore::open_in_memory().unwrap();
        let a = store.get_or_create_tag("report").await.unwrap();
        let b = store.get_or_create_tag("report").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn file_tags_join_round_trips() {
        let store = IndexStore::open_in_memory().unwrap();
        store.add_file_tag("/a.txt", "report").await.unwrap();
        store.add_file_tag("/a.txt", "urgent").await.unwrap();
        let tags = store.list_tags_for_file("/a.txt").await.unwrap();
        assert_eq!(tags.len(), 2);

        store.remove_file_tag("/a.txt", "urgent").await.unwrap();
        let tags = store.list_tags_for_file("/a.txt").await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "report");
    }
}
