//! Storage locations for the job store.

use std::path::PathBuf;

/// App cache root: `~/Library/Caches/alphagenome-mcp/` (macOS) or `~/.cache/alphagenome-mcp/` (Linux).
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("alphagenome-mcp"))
}

/// SQLite database file: `<app_cache_dir>/jobs.db`.
pub fn db_path() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("jobs.db"))
}
