//! File entity and the loosely-typed mapping `upsert_file` accepts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The columns `upsert_file` is allowed to touch. Anything outside this set
/// is dropped rather than rejected, so callers can pass a superset mapping
/// without caring which fields this index actually tracks.
pub const FILE_COLUMNS: &[&str] = &[
    "name",
    "folder_path",
    "size",
    "modified_at",
    "created_at",
    "accessed_at",
    "indexed_at",
    "mime_type",
    "sha256_hash",
    "file_type",
    "category",
];

/// A partial column update for `upsert_file`, keyed by column name.
pub type FileData = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Document,
    Audio,
    Video,
    Other,
}

impl Category {
    /// Classify a path by extension/MIME guess, following the same
    /// extension-first heuristic the corpus's launcher indexers use.
    pub fn guess(path: &Path) -> Self {
        let guess = mime_guess::from_path(path);
        let Some(mime) = guess.first() else {
            return Category::Other;
        };
        match mime.type_() {
            mime_guess::mime::IMAGE => Category::Image,
            mime_guess::mime::AUDIO => Category::Audio,
            mime_guess::mime::VIDEO => Category::Video,
            _ => {
                let subtype = mime.subtype().as_str();
                let type_ = mime.type_().as_str();
                if type_ == "application"
                    && matches!(
                        subtype,
                        "pdf" | "msword" | "rtf" | "json" | "xml" | "zip" | "x-tar"
                    )
                    || type_ == "text"
                {
                    Category::Document
                } else {
                    Category::Other
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub folder_path: Option<String>,
    pub size: i64,
    pub modified_at: i64,
    pub created_at: i64,
    pub accessed_at: i64,
    pub indexed_at: i64,
    pub mime_type: Option<String>,
    pub sha256_hash: Option<String>,
    pub file_type: Option<String>,
    pub category: Category,
}
