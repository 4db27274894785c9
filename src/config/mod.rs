//! Application configuration: watcher, performance-manager, and query-limit
//! knobs, loaded from a TOML file in the data directory the same way the
//! teacher's app config is loaded from its data directory.

pub mod migration;

pub use migration::Migrate;

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "index-config.toml";
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub stability_threshold_ms: u64,
    pub poll_interval_ms: u64,
    pub use_polling: bool,
    pub follow_symlinks: bool,
    pub batch_collect_time_ms: u64,
    pub default_batch_size: usize,
    pub enable_batching: bool,
    pub default_delay_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_threshold_ms: 1000,
            poll_interval_ms: 100,
            use_polling: false,
            follow_symlinks: false,
            batch_collect_time_ms: 250,
            default_batch_size: 10,
            enable_batching: true,
            default_delay_ms: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub single_folder_delay_ms: u64,
    pub multi_folder_delay_multiplier: f64,
    pub watching_delay_factor: f64,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub single_folder_batch_size: usize,
    pub multi_folder_batch_divisor: f64,
    pub smoothing_window: usize,
    pub smoothing_factor: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 20,
            max_delay_ms: 2000,
            single_folder_delay_ms: 50,
            multi_folder_delay_multiplier: 1.5,
            watching_delay_factor: 4.0,
            min_batch_size: 1,
            max_batch_size: 200,
            single_folder_batch_size: 50,
            multi_folder_batch_divisor: 1.5,
            smoothing_window: 3,
            smoothing_factor: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLimits {
    pub quick_search: usize,
    pub filtered_search: usize,
    pub application_search: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            quick_search: 100,
            filtered_search: 200,
            application_search: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub cache_max_size: usize,
    pub cache_ttl_ms: u64,
    pub status_update_interval_ms: u64,
    pub watcher: WatcherConfig,
    pub performance: PerformanceConfig,
    pub query_limits: QueryLimits,
}

impl Config {
    pub fn load_or_create(data_dir: &Path) -> IndexResult<Self> {
        Self::load_from(data_dir).or_else(|_| {
            let config = Self::default_with_dir(data_dir.to_path_buf());
            config.save()?;
            Ok(config)
        })
    }

    pub fn load_from(data_dir: &Path) -> IndexResult<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            info!(path = %config_path.display(), "loading config");
            let text = fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&text)?;
            if config.needs_migration() {
                info!(
                    from = config.current_version(),
                    to = Self::target_version(),
                    "migrating config"
                );
                config.migrate()?;
                config.save()?;
            }
            Ok(config)
        } else {
            warn!(path = %config_path.display(), "no config found, creating default");
            let config = Self::default_with_dir(data_dir.to_path_buf());
            config.save()?;
            Ok(config)
        }
    }

    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: CONFIG_VERSION,
            data_dir,
            log_level: "info".to_string(),
            cache_max_size: 5000,
            cache_ttl_ms: 60_000,
            status_update_interval_ms: 1000,
            watcher: WatcherConfig::default(),
            performance: PerformanceConfig::default(),
            query_limits: QueryLimits::default(),
        }
    }

    pub fn save(&self) -> IndexResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(CONFIG_FILE_NAME);
        let text = toml::to_string_pretty(self)?;
        fs::write(&config_path, text)?;
        Ok(())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_directories(&self) -> IndexResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("disk-index"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::default_with_dir(data_dir)
    }
}

impl Migrate for Config {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn target_version() -> u32 {
        CONFIG_VERSION
    }

    fn migrate(&mut self) -> anyhow::Result<()> {
        match self.version {
            v if v >= Self::target_version() => Ok(()),
            0 => {
                self.version = 1;
                Ok(())
            }
            v => Err(anyhow::anyhow!("unknown config version: {v}")),
        }
    }
}

impl From<anyhow::Error> for IndexError {
    fn from(err: anyhow::Error) -> Self {
        IndexError::StoreError(err.to_string())
    }
}
