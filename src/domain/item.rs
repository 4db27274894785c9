//! `Item`: the common projection of files and folders used by quick and
//! filtered search (the `all_items` view materialized as a Rust type).

use super::file::Category;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub path: String,
    pub name: String,
    pub item_type: ItemType,
    pub category: Option<Category>,
    pub size: i64,
    pub modified_at: i64,
    pub is_favorite: bool,
    /// Internal rank bucket (1 = best); not part of the public IPC shape but
    /// kept alongside results so tests can assert ordering directly.
    pub rank: i64,
}
