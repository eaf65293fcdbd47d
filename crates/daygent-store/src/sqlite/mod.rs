//! SQLite-backed store
//!
//! Single-file (or in-memory) SQLite storage for workspaces and the usage
//! ledger. Migrations run inline at open time.

mod migrations;
mod queries;


use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

use crate::error::{Result, StoreError};

/// SQLite-based proxy store
pub struct SqliteStore {
    pub(super) pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a database at the given path
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Migration(format!("Failed to create directory: {}", e)))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open an in-memory database, mainly for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}
