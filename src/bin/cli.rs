//! `indexd` — a small CLI for driving a `disk-index-core` instance directly,
//! grounded on the teacher's `spacedrive-cli` (subcommand layout, `EnvFilter`
//! log setup) but scoped to this crate's own operations.

use clap::{Parser, Subcommand};
use disk_index_core::controller::AddWatchResult;
use disk_index_core::domain::watched_folder::Depth;
use disk_index_core::Core;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "indexd")]
#[command(about = "Local-disk index and search CLI", long_about = None)]
struct Cli {
    /// Data directory holding the index database and config file.
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage watched folders.
    #[command(subcommand)]
    Watch(WatchCommands),

    /// Query the index.
    #[command(subcommand)]
    Search(SearchCommands),

    /// Show aggregate indexing status.
    Status,

    /// Run an orphan-cleanup pass immediately.
    Cleanup,
}

#[derive(Subcommand)]
enum WatchCommands {
    /// Start watching a folder.
    Add {
        path: PathBuf,
        /// Maximum recursion depth; omit for unlimited.
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Stop watching a folder.
    Remove { path: PathBuf },
    /// List every watched folder and its live status.
    List,
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Rank-ordered search over files and folders.
    Quick { query: String },
    /// Search installed applications.
    Apps { query: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("disk_index_core={log_level},indexd={log_level}")));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let data_dir = cli
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("disk-index")))
        .unwrap_or_else(|| PathBuf::from("."));

    let core = Core::new(data_dir).await?;

    match cli.command {
        Commands::Watch(WatchCommands::Add { path, depth }) => {
            let depth = depth.map(Depth::Limited).unwrap_or(Depth::Unlimited);
            let AddWatchResult {
                success,
                error,
                overlapping_folder,
            } = core.controller.add_watch_path(path.to_string_lossy().to_string(), depth).await?;
            if success {
                println!("watching {}", path.display());
            } else {
                println!(
                    "failed to watch {}: {}{}",
                    path.display(),
                    error.unwrap_or_default(),
                    overlapping_folder
                        .map(|f| format!(" (overlaps {f})"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Watch(WatchCommands::Remove { path }) => {
            let removed = core
                .controller
                .remove_watch_path(path.to_string_lossy().to_string())
                .await?;
            println!("{}", if removed { "removed" } else { "not watched" });
        }
        Commands::Watch(WatchCommands::List) => {
            let status = core.controller.get_status().await?;
            for folder in status.folders {
                println!(
                    "{}\t{:?}\tpaused={}\t{}/{} files",
                    folder.path, folder.state, folder.is_paused, folder.stats.processed_files, folder.stats.total_files
                );
            }
        }
        Commands::Search(SearchCommands::Quick { query }) => {
            for item in core.search.quick_search(&query).await? {
                println!("{}\t{}", item.path, item.name);
            }
        }
        Commands::Search(SearchCommands::Apps { query }) => {
            for app in core.search.search_applications(&query).await? {
                println!("{}\t{}", app.path, app.display_name);
            }
        }
        Commands::Status => {
            let status = core.controller.get_status().await?;
            println!(
                "{:?}: {}/{} files across {} watchers ({} indexing, {} watching)",
                status.status,
                status.processed_files,
                status.total_files,
                status.total_watchers,
                status.active_indexing_watchers,
                status.watching_watchers
            );
        }
        Commands::Cleanup => {
            let report = core.controller.cleanup_orphaned_database_entries().await?;
            println!(
                "checked {} entries, removed {}",
                report.checked_entries, report.removed_entries
            );
        }
    }

    core.shutdown().await?;
    Ok(())
}
