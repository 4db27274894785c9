//! Installed-application entity. Discovery itself (platform app registries,
//! icon extraction) is out of scope; this type is the index-side record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub path: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub icon: Option<String>,
    pub last_updated: i64,
    pub application_type: Option<String>,
    pub is_system: bool,
    pub is_custom_added: bool,
    pub is_favorite: bool,
    pub favorite_added_at: Option<i64>,
}

/// Minimal shape needed to restore a favorite after a system-app reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub path: String,
    pub name: String,
    pub favorite_added_at: Option<i64>,
}
