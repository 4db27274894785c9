//! Search Engine: ranked lookups over the `all_items` view (quick search),
//! a filtered/faceted query (type, date, size, tags, text), and application
//! search.
//!
//! Ranking is computed in SQL with a `CASE WHEN` cascade, grounded on the
//! retrieved launcher index service's ranked-search query shape noted in
//! `store/files.rs`; the small filtered-search result set is sorted
//! in-memory afterward, per the same design note.

use crate::config::QueryLimits;
use crate::domain::file::Category;
use crate::domain::item::{Item, ItemType};
use crate::domain::Application;
use crate::error::IndexResult;
use crate::store::IndexStore;
use rusqlite::types::Value;
use rusqlite::Row;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SizeRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub types: Vec<String>,
    pub date_range: Option<DateRange>,
    pub size: Option<SizeRange>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilteredSearchQuery {
    pub query: Option<String>,
    pub filters: SearchFilters,
}

fn preprocess(query: &str) -> Vec<String> {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let item_type_str: String = row.get(2)?;
    let category_str: String = row.get(3)?;
    let item_type = ItemType::from_str(&item_type_str).unwrap_or(ItemType::File);
    let category = match item_type {
        ItemType::File => Some(Category::from_str(&category_str).unwrap_or(Category::Other)),
        ItemType::Folder => None,
    };
    Ok(Item {
        path: row.get(0)?,
        name: row.get(1)?,
        item_type,
        category,
        size: row.get(4)?,
        modified_at: row.get(5)?,
        is_favorite: row.get::<_, i64>(6)? != 0,
        rank: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
    })
}

const ITEM_COLUMNS_SQL: &str = "path, name, item_type, category, size, modified_at, is_favorite";

pub struct SearchEngine {
    store: Arc<IndexStore>,
    limits: QueryLimits,
}

impl SearchEngine {
    pub fn new(store: Arc<IndexStore>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// Single-token path ranks 1 (exact) / 2 (starts-with) / 3 (contains) /
    /// 4 (else, unreachable given the `WHERE` clause below). Multi-token
    /// path requires every token present as a substring of `name` (AND),
    /// ranked on the same 1-4 scale against the rejoined full query.
    pub async fn quick_search(&self, query: &str) -> IndexResult<Vec<Item>> {
        let tokens = preprocess(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.limits.quick_search as i64;

        if tokens.len() == 1 {
            let token = tokens[0].clone();
            let starts = format!("{token}%");
            let contains = format!("%{token}%");
            self.store
                .with_conn(move |conn| {
                    let sql = format!(
                        "SELECT {ITEM_COLUMNS_SQL}, \
                         CASE WHEN lower(name) = ?1 THEN 1 \
                              WHEN lower(name) LIKE ?2 THEN 2 \
                              WHEN lower(name) LIKE ?3 THEN 3 \
                              ELSE 4 END AS rank \
                         FROM all_items \
                         WHERE lower(name) LIKE ?3 \
                         ORDER BY is_favorite DESC, rank ASC, modified_at DESC \
                         LIMIT ?4"
                    );
                    let mut stmt = conn.prepare_cached(&sql)?;
                    let rows = stmt
                        .query_map(rusqlite::params![token, starts, contains, limit], row_to_item)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })
                .await
        } else {
            let full_query = tokens.join(" ");
            let starts = format!("{full_query}%");
            let contains = format!("%{full_query}%");
            let mut params: Vec<Value> = vec![
                Value::Text(full_query.clone()),
                Value::Text(starts),
                Value::Text(contains),
            ];
            let token_clauses = tokens
                .iter()
                .map(|t| {
                    params.push(Value::Text(format!("%{t}%")));
                    format!("lower(name) LIKE ?{}", params.len())
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            params.push(Value::Integer(limit));
            let limit_idx = params.len();

            self.store
                .with_conn(move |conn| {
                    let sql = format!(
                        "SELECT {ITEM_COLUMNS_SQL}, \
                         CASE WHEN lower(name) = ?1 THEN 1 \
                              WHEN lower(name) LIKE ?2 THEN 2 \
                              WHEN lower(name) LIKE ?3 THEN 3 \
                              ELSE 4 END AS rank \
                         FROM all_items \
                         WHERE {token_clauses} \
                         ORDER BY is_favorite DESC, rank ASC, modified_at DESC \
                         LIMIT ?{limit_idx}"
                    );
                    let mut stmt = conn.prepare_cached(&sql)?;
                    let rows = stmt
                        .query_map(rusqlite::params_from_iter(params.iter()), row_to_item)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })
                .await
        }
    }

    /// Filters narrow the candidate set in SQL; the final sort (favorite,
    /// item kind, recency) happens in memory since the filtered result set
    /// is expected to be small.
    pub async fn filtered_search(&self, query: FilteredSearchQuery) -> IndexResult<Vec<Item>> {
        let limit = self.limits.filtered_search;
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if !query.filters.types.is_empty() {
            let include_folders = query.filters.types.iter().any(|t| t == "folder");
            let file_categories: Vec<&String> =
                query.filters.types.iter().filter(|t| t.as_str() != "folder").collect();

            let mut branches = Vec::new();
            if include_folders {
                branches.push("item_type = 'folder'".to_string());
            }
            if !file_categories.is_empty() {
                let placeholders = file_categories
                    .iter()
                    .map(|cat| {
                        params.push(Value::Text(cat.to_string()));
                        format!("?{}", params.len())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                branches.push(format!("(item_type = 'file' AND category IN ({placeholders}))"));
            }
            clauses.push(format!("({})", branches.join(" OR ")));
        }

        if let Some(range) = &query.filters.date_range {
            if let Some(from) = range.from {
                params.push(Value::Integer(from));
                clauses.push(format!("modified_at >= ?{}", params.len()));
            }
            if let Some(to) = range.to {
                params.push(Value::Integer(to));
                clauses.push(format!("modified_at <= ?{}", params.len()));
            }
        }

        if let Some(size) = &query.filters.size {
            if let Some(min) = size.min {
                params.push(Value::Integer(min));
                clauses.push(format!("size >= ?{}", params.len()));
            }
            if let Some(max) = size.max {
                params.push(Value::Integer(max));
                clauses.push(format!("size <= ?{}", params.len()));
            }
        }

        if !query.filters.tags.is_empty() {
            let placeholders = query
                .filters
                .tags
                .iter()
                .map(|tag| {
                    params.push(Value::Text(tag.clone()));
                    format!("?{}", params.len())
                })
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!(
                "path IN (SELECT ft.file_path FROM file_tags ft \
                 JOIN tags t ON t.id = ft.tag_id WHERE t.name IN ({placeholders}))"
            ));
        }

        if let Some(text) = &query.query {
            let tokens = preprocess(text);
            if !tokens.is_empty() {
                let mut name_params = Vec::new();
                let name_clause = tokens
                    .iter()
                    .map(|t| {
                        params.push(Value::Text(format!("%{t}%")));
                        name_params.push(params.len());
                        format!("lower(name) LIKE ?{}", params.len())
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let notes_clause = tokens
                    .iter()
                    .map(|t| {
                        params.push(Value::Text(format!("%{t}%")));
                        format!("lower(content) LIKE ?{}", params.len())
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ");
                clauses.push(format!(
                    "(({name_clause}) OR path IN (SELECT target_path FROM notes WHERE {notes_clause}))"
                ));
            }
        }

        let where_sql = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };

        let mut items = self
            .store
            .with_conn(move |conn| {
                let sql =
                    format!("SELECT {ITEM_COLUMNS_SQL} FROM all_items WHERE {where_sql}");
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                        Ok(Item {
                            path: row.get(0)?,
                            name: row.get(1)?,
                            item_type: ItemType::from_str(&row.get::<_, String>(2)?).unwrap_or(ItemType::File),
                            category: {
                                let item_type_str: String = row.get(2)?;
                                if item_type_str == "file" {
                                    Some(Category::from_str(&row.get::<_, String>(3)?).unwrap_or(Category::Other))
                                } else {
                                    None
                                }
                            },
                            size: row.get(4)?,
                            modified_at: row.get(5)?,
                            is_favorite: row.get::<_, i64>(6)? != 0,
                            rank: 0,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        items.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| item_kind_weight(a.item_type).cmp(&item_kind_weight(b.item_type)))
                .then_with(|| b.modified_at.cmp(&a.modified_at))
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Rank 1-7 across name/display_name/description/keywords, in that
    /// priority order; `keywords` is matched against its serialized JSON
    /// array text, which is sufficient for substring containment.
    pub async fn search_applications(&self, query: &str) -> IndexResult<Vec<Application>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.limits.application_search as i64;
        let pattern = format!("%{needle}%");

        self.store
            .with_conn(move |conn| {
                let sql = "SELECT path, name, display_name, description, keywords, categories, \
                           icon, last_updated, application_type, is_system, is_custom_added, \
                           is_favorite, favorite_added_at, \
                           CASE WHEN lower(name) = ?1 THEN 1 \
                                WHEN lower(display_name) = ?1 THEN 2 \
                                WHEN lower(name) LIKE ?2 THEN 3 \
                                WHEN lower(display_name) LIKE ?2 THEN 4 \
                                WHEN lower(coalesce(description, '')) LIKE ?2 THEN 5 \
                                WHEN lower(keywords) LIKE ?2 THEN 6 \
                                ELSE 7 END AS rank \
                           FROM applications \
                           WHERE lower(name) LIKE ?2 OR lower(display_name) LIKE ?2 \
                              OR lower(coalesce(description, '')) LIKE ?2 OR lower(keywords) LIKE ?2 \
                           ORDER BY is_favorite DESC, rank ASC, last_updated DESC \
                           LIMIT ?3";
                let mut stmt = conn.prepare_cached(sql)?;
                let rows = stmt
                    .query_map(rusqlite::params![needle, pattern, limit], |row| {
                        let keywords: String = row.get(4)?;
                        let categories: String = row.get(5)?;
                        Ok(Application {
                            path: row.get(0)?,
                            name: row.get(1)?,
                            display_name: row.get(2)?,
                            description: row.get(3)?,
                            keywords: serde_json::from_str(&keywords).unwrap_or_default(),
                            categories: serde_json::from_str(&categories).unwrap_or_default(),
                            icon: row.get(6)?,
                            last_updated: row.get(7)?,
                            application_type: row.get(8)?,
                            is_system: row.get::<_, i64>(9)? != 0,
                            is_custom_added: row.get::<_, i64>(10)? != 0,
                            is_favorite: row.get::<_, i64>(11)? != 0,
                            favorite_added_at: row.get(12)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }
}

fn item_kind_weight(item_type: ItemType) -> u8 {
    match item_type {
        ItemType::Folder => 0,
        ItemType::File => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::file::FileData;
    use crate::domain::Application as AppEntity;
    use serde_json::json;

    async fn seeded_store() -> Arc<IndexStore> {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        for (path, name, modified_at, favorite) in [
            ("/n/alpha", "alpha", 3, false),
            ("/n/alphabet", "alphabet", 5, false),
            ("/n/beta_alpha", "beta_alpha", 10, true),
        ] {
            let mut data = FileData::new();
            data.insert("name".into(), json!(name));
            data.insert("modified_at".into(), json!(modified_at));
            store.upsert_file(path, data).await.unwrap();
            if favorite {
                store.favorites_add(path, 1).await.unwrap();
            }
        }
        store
    }

    #[tokio::test]
    async fn quick_search_ranks_favorite_then_exact_then_prefix() {
        let store = seeded_store().await;
        let engine = SearchEngine::new(store, QueryLimits::default());
        let results = engine.quick_search("alpha").await.unwrap();
        let names: Vec<&str> = results.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["beta_alpha", "alpha", "alphabet"]);
    }

    #[tokio::test]
    async fn multi_token_query_matches_regardless_of_order() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let mut data = FileData::new();
        data.insert("name".into(), json!("WEBsite_DEVelopment"));
        store.upsert_file("/w", data).await.unwrap();

        let engine = SearchEngine::new(store, QueryLimits::default());
        assert_eq!(engine.quick_search("web dev").await.unwrap().len(), 1);
        assert_eq!(engine.quick_search("dev web").await.unwrap().len(), 1);
        assert_eq!(engine.quick_search("webqqqz").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn filtered_search_by_type_size_and_tags() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let mut small = FileData::new();
        small.insert("name".into(), json!("small.pdf"));
        small.insert("size".into(), json!(200));
        small.insert("category".into(), json!("document"));
        store.upsert_file("/small.pdf", small).await.unwrap();

        let mut large = FileData::new();
        large.insert("name".into(), json!("large.pdf"));
        large.insert("size".into(), json!(2_000_000));
        large.insert("category".into(), json!("document"));
        store.upsert_file("/large.pdf", large).await.unwrap();

        store.add_file_tag("/small.pdf", "report").await.unwrap();
        store.add_file_tag("/large.pdf", "report").await.unwrap();

        let engine = SearchEngine::new(store, QueryLimits::default());
        let results = engine
            .filtered_search(FilteredSearchQuery {
                query: None,
                filters: SearchFilters {
                    types: vec!["document".to_string()],
                    date_range: None,
                    size: Some(SizeRange {
                        min: Some(1000),
                        max: None,
                    }),
                    tags: vec!["report".to_string()],
                },
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/large.pdf");
    }

    #[tokio::test]
    async fn filtered_search_custom_category_equal_to_builtin_name_matches_literally() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let mut data = FileData::new();
        data.insert("name".into(), json!("misc.bin"));
        data.insert("category".into(), json!("other"));
        store.upsert_file("/misc.bin", data).await.unwrap();

        let engine = SearchEngine::new(store, QueryLimits::default());
        let results = engine
            .filtered_search(FilteredSearchQuery {
                query: None,
                filters: SearchFilters {
                    types: vec!["other".to_string()],
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/misc.bin");
    }

    #[tokio::test]
    async fn search_applications_ranks_exact_name_first() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        for (path, name, display) in [("/a", "editor", "Editor Pro"), ("/b", "zed", "editor")] {
            store
                .upsert_application(AppEntity {
                    path: path.to_string(),
                    name: name.to_string(),
                    display_name: display.to_string(),
                    description: None,
                    keywords: vec![],
                    categories: vec![],
                    icon: None,
                    last_updated: 0,
                    application_type: None,
                    is_system: false,
                    is_custom_added: true,
                    is_favorite: false,
                    favorite_added_at: None,
                })
                .await
                .unwrap();
        }

        let engine = SearchEngine::new(store, QueryLimits::default());
        let results = engine.search_applications("editor").await.unwrap();
        assert_eq!(results[0].path, "/a");
    }
}
