//! WatchedFolder entity and its `depth` convention.

use serde::{Deserialize, Serialize};

/// Recursion depth for a watched root. `Unlimited` is the `depth=∞`
/// convention from the source system; stored on disk as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Depth {
    Unlimited,
    Limited(u32),
}

impl Depth {
    pub fn to_db(self) -> i64 {
        match self {
            Depth::Unlimited => -1,
            Depth::Limited(n) => n as i64,
        }
    }

    pub fn from_db(value: i64) -> Self {
        if value < 0 {
            Depth::Unlimited
        } else {
            Depth::Limited(value as u32)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedFolder {
    pub path: String,
    pub name: String,
    pub total_files: i64,
    pub processed_files: i64,
    pub last_indexed: Option<i64>,
    pub last_modified: Option<i64>,
    pub depth: Depth,
}
