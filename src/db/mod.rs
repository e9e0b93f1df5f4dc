/// Database layer
///
/// SQLite connection pools for the entry store.

use crate::error::BlobResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> BlobResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .busy_timeout(Duration::from_secs(5)),
        )
        .await?;

    tracing::info!(path = %path.display(), "sqlite_pool_created");
    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> BlobResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_pool_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("entries.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        test_connection(&pool).await.unwrap();

        assert!(path.exists());
    }
}
