//! Notes attached to a file, folder, or emoji.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    File,
    Folder,
    Emoji,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub target_path: String,
    pub target_type: TargetType,
    pub content: String,
    pub updated_at: i64,
}
