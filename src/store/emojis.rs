//! `emojis` table operations. Emoji rows are mostly created lazily: the
//! first note or favorite against `emoji:/<char>` auto-creates the row, per
//! §4.1's notes contract.

use super::IndexStore;
use crate::domain::emoji::emoji_path;
use crate::domain::Emoji;
use crate::error::IndexResult;
use rusqlite::OptionalExtension;

fn row_to_emoji(row: &rusqlite::Row<'_>) -> rusqlite::Result<Emoji> {
    Ok(Emoji {
        path: row.get(0)?,
        char: row.get(1)?,
        name: row.get(2)?,
        is_favorite: row.get::<_, i64>(3)? != 0,
        favorite_added_at: row.get(4)?,
        favorite_sort_order: row.get(5)?,
    })
}

const SELECT_EMOJI_SQL: &str = "SELECT path, char, name, is_favorite, favorite_added_at, \
     favorite_sort_order FROM emojis WHERE path = ?1";

impl IndexStore {
    pub async fn get_emoji(&self, path: &str) -> IndexResult<Option<Emoji>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_EMOJI_SQL, [&path], row_to_emoji).optional()
        })
        .await
    }

    /// Inserts the row for `char` if it doesn't already exist, defaulting
    /// `name` to `char` itself. Idempotent.
    pub async fn ensure_emoji(&self, char: &str) -> IndexResult<()> {
        let char = char.to_string();
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO emojis (path, char, name, is_favorite) \
                 VALUES (?1, ?2, ?2, 0)",
            )?
            .execute(rusqlite::params![emoji_path(&char), char])?;
            Ok(())
        })
        .await
    }

    pub async fn set_emoji_favorite(
        &self,
        char: &str,
        is_favorite: bool,
        favorite_added_at: Option<i64>,
    ) -> IndexResult<()> {
        self.ensure_emoji(char).await?;
        let path = emoji_path(char);
        self.with_conn(move |conn| {
            conn.prepare_cached(
                "UPDATE emojis SET is_favorite = ?1, favorite_added_at = ?2 WHERE path = ?3",
            )?
            .execute(rusqlite::params![is_favorite as i64, favorite_added_at, path])?;
            Ok(())
        })
        .await
    }

    pub async fn list_favorite_emojis(&self) -> IndexResult<Vec<Emoji>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT path, char, name, is_favorite, favorite_added_at, favorite_sort_order \
                 FROM emojis WHERE is_favorite = 1 ORDER BY favorite_sort_order, favorite_added_at",
            )?;
            let rows = stmt
                .query_map([], row_to_emoji)?
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
    async fn ensure_emoji_is_idempotent_and_favoriting_auto_creates() {
        let store = IndexStore::open_in_memory().unwrap();
        assert!(store.get_emoji(&emoji_path("🎉")).await.unwrap().is_none());
        store
            .set_emoji_favorite("🎉", true, Some(5))
            .await
            .unwrap();
        let emoji = store.get_emoji(&emoji_path("🎉")).await.unwrap().unwrap();
        assert!(emoji.is_favorite);
        assert_eq!(emoji.favorite_added_at, Some(5));
    }
}
