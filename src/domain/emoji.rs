//! Emoji entity. Paths take the form `emoji:/<char>` so notes and favorites
//! can address an emoji the same way they address a file or folder.

use serde::{Deserialize, Serialize};

pub const EMOJI_PATH_PREFIX: &str = "emoji:/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emoji {
    pub path: String,
    pub char: String,
    pub name: String,
    pub is_favorite: bool,
    pub favorite_added_at: Option<i64>,
    pub favorite_sort_order: Option<i64>,
}

pub fn emoji_path(char: &str) -> String {
    format!("{EMOJI_PATH_PREFIX}{char}")
}
