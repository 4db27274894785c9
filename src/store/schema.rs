//! Embedded schema and migration runner.
//!
//! Expressed as raw SQL blocks rather than SeaORM migration structs, since
//! this Store speaks `rusqlite` directly, but numbered and applied in order
//! the same way the teacher's migration modules are.

use rusqlite::Connection;

const CURRENT_SCHEMA_VERSION: i64 = 2;

const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    r#"
    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS watched_folders (
        path TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        total_files INTEGER NOT NULL DEFAULT 0,
        processed_files INTEGER NOT NULL DEFAULT 0,
        last_indexed INTEGER,
        last_modified INTEGER,
        depth INTEGER NOT NULL DEFAULT -1
    );

    CREATE TABLE IF NOT EXISTS folders (
        path TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        parent_path TEXT,
        modified_at INTEGER NOT NULL DEFAULT 0,
        indexed_at INTEGER NOT NULL DEFAULT 0,
        direct_file_count INTEGER NOT NULL DEFAULT 0,
        direct_child_count INTEGER NOT NULL DEFAULT 0,
        total_file_count INTEGER NOT NULL DEFAULT 0,
        total_child_count INTEGER NOT NULL DEFAULT 0,
        watched_folder_path TEXT NOT NULL REFERENCES watched_folders(path) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_folders_parent_path ON folders(parent_path);
    CREATE INDEX IF NOT EXISTS idx_folders_watched_folder_path ON folders(watched_folder_path);

    CREATE TABLE IF NOT EXISTS files (
        path TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        folder_path TEXT,
        size INTEGER NOT NULL DEFAULT 0,
        modified_at INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0,
        accessed_at INTEGER NOT NULL DEFAULT 0,
        indexed_at INTEGER NOT NULL DEFAULT 0,
        mime_type TEXT,
        sha256_hash TEXT,
        file_type TEXT,
        category TEXT NOT NULL DEFAULT 'other'
    );
    CREATE INDEX IF NOT EXISTS idx_files_folder_path ON files(folder_path);
    CREATE INDEX IF NOT EXISTS idx_files_name ON files(name);

    CREATE TABLE IF NOT EXISTS applications (
        path TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT,
        keywords TEXT NOT NULL DEFAULT '[]',
        categories TEXT NOT NULL DEFAULT '[]',
        icon TEXT,
        last_updated INTEGER NOT NULL DEFAULT 0,
        application_type TEXT,
        is_system INTEGER NOT NULL DEFAULT 0,
        is_custom_added INTEGER NOT NULL DEFAULT 0,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        favorite_added_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_applications_name ON applications(name);

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS file_tags (
        file_path TEXT NOT NULL,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (file_path, tag_id)
    );

    CREATE TABLE IF NOT EXISTS notes (
        target_path TEXT NOT NULL,
        target_type TEXT NOT NULL,
        content TEXT NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT 0,
        UNIQUE(target_path, target_type)
    );

    CREATE TABLE IF NOT EXISTS emojis (
        path TEXT PRIMARY KEY,
        char TEXT NOT NULL,
        name TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        favorite_added_at INTEGER,
        favorite_sort_order INTEGER
    );

    CREATE VIEW IF NOT EXISTS all_items AS
        SELECT path, name, 'file' AS item_type, category, size, modified_at, is_favorite
        FROM (
            SELECT f.path, f.name, f.category, f.size, f.modified_at,
                   CASE WHEN a.path IS NOT NULL AND a.is_favorite = 1 THEN 1 ELSE 0 END AS is_favorite
            FROM files f
            LEFT JOIN applications a ON a.path = f.path
        )
        UNION ALL
        SELECT path, name, 'folder' AS item_type, 'other' AS category, total_file_count AS size,
               modified_at, 0 AS is_favorite
        FROM folders;
    "#,
    // v2: a path-addressed favorites table for files/folders (applications
    // and emojis keep their own dedicated `is_favorite` column), and the
    // `all_items` view rewritten to read real favorite state for files and
    // folders instead of hardcoding it.
    r#"
    CREATE TABLE IF NOT EXISTS favorites (
        target_path TEXT NOT NULL,
        target_type TEXT NOT NULL,
        favorite_added_at INTEGER NOT NULL,
        PRIMARY KEY (target_path, target_type)
    );

    DROP VIEW IF EXISTS all_items;
    CREATE VIEW all_items AS
        SELECT path, name, 'file' AS item_type, category, size, modified_at, is_favorite
        FROM (
            SELECT f.path, f.name, f.category, f.size, f.modified_at,
                   CASE WHEN fav.target_path IS NOT NULL THEN 1 ELSE 0 END AS is_favorite
            FROM files f
            LEFT JOIN favorites fav ON fav.target_path = f.path AND fav.target_type = 'file'
        )
        UNION ALL
        SELECT path, name, 'folder' AS item_type, 'other' AS category, total_file_count AS size,
               modified_at, is_favorite
        FROM (
            SELECT fo.path, fo.name, fo.total_file_count, fo.modified_at,
                   CASE WHEN fav.target_path IS NOT NULL THEN 1 ELSE 0 END AS is_favorite
            FROM folders fo
            LEFT JOIN favorites fav ON fav.target_path = fo.path AND fav.target_type = 'folder'
        );
    "#,
];

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS index_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version > current {
            conn.execute_batch(migration)?;
        }
    }

    conn.execute(
        "INSERT INTO index_meta(key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO index_meta(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    })
}
