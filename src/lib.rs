//! disk-index-core
//!
//! A background indexing and search engine for local-disk content: watches
//! user-selected folders, maintains a persistent relational index of their
//! files and subfolders, and answers ranked queries over files, folders, and
//! installed applications.

pub mod cache;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod performance;
pub mod search;
pub mod status;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use controller::IndexController;
pub use error::{IndexError, IndexResult};
pub use search::SearchEngine;
pub use store::IndexStore;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Top-level composition root wiring the Store, Controller, and Search Engine
/// together the way a host process would.
pub struct Core {
    pub config: Config,
    pub store: Arc<IndexStore>,
    pub controller: Arc<IndexController>,
    pub search: SearchEngine,
}

impl Core {
    /// Boot the indexer against a data directory, opening (or creating) its
    /// database and loading any previously-watched roots.
    pub async fn new(data_dir: PathBuf) -> IndexResult<Self> {
        let config = Config::load_or_create(&data_dir)?;
        config.ensure_directories()?;

        info!(path = %data_dir.display(), "opening index store");
        let db_path = data_dir.join("index.sqlite3");
        let store = Arc::new(IndexStore::open(&db_path).await?);

        let controller = Arc::new(IndexController::new(store.clone(), config.clone()));
        controller.initialize().await?;

        let search = SearchEngine::new(store.clone(), config.query_limits.clone());

        Ok(Self {
            config,
            store,
            controller,
            search,
        })
    }

    pub async fn shutdown(&self) -> IndexResult<()> {
        info!("shutting down index controller");
        self.controller.shutdown().await
    }
}
