use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use finsight_core::config::StorageConfig;

use crate::error::StoreError;

/// Open (creating if missing) the SQLite database and apply migrations.
pub async fn init_pool(config: &StorageConfig) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("SQLite connected: {}", config.db_path.display());
    Ok(pool)
}
