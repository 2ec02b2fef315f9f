//! Storage layer: named blob persistence.
//!
//! Every blob is a whole document written and read in one piece; callers
//! own the format. Two backends: a directory of JSON files and a SQLite
//! table.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub mod json_dir;
pub mod sqlite;

pub use json_dir::JsonDirStore;
pub use sqlite::SqliteBlobStore;

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `None` when the blob has never been written.
    async fn read(&self, name: &str) -> anyhow::Result<Option<String>>;

    /// Replaces the blob in full.
    async fn write(&self, name: &str, body: &str) -> anyhow::Result<()>;
}

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}?mode=rwc", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}?mode=rwc", norm);
        }
    }
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect(&url).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies the migrations in crates/storage/migrations; idempotent.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
