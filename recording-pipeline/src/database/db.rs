//! Pool creation and migration runner.

use std::str::FromStr;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to the database: {0}")]
    ConnectionFailed(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    MigrationFailed(#[from] MigrateError),
}

/// Opens (creating if needed) the SQLite database at `database_url` and
/// runs pending migrations.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
