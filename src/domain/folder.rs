//! Folder entity: denormalized direct/total counts recomputed bottom-up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub path: String,
    pub name: String,
    pub parent_path: Option<String>,
    pub modified_at: i64,
    pub indexed_at: i64,
    pub direct_file_count: i64,
    pub direct_child_count: i64,
    pub total_file_count: i64,
    pub total_child_count: i64,
    pub watched_folder_path: String,
}
