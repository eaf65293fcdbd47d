use super::SqliteStore;
use crate::error::{Result, StoreError};

impl SqliteStore {
    /// Run database migrations
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                usage_limit_monthly REAL NOT NULL DEFAULT 10.0,
                usage_limit_enabled BOOLEAN NOT NULL DEFAULT TRUE,
                api_key_sealed TEXT,
                api_provider TEXT,
                agent_context TEXT,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Migration(format!("workspaces: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_records (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                user_id TEXT,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                cost REAL NOT NULL,
                endpoint TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Migration(format!("usage_records: {}", e)))?;

        // Monthly aggregates scan by workspace and time range
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_workspace_created ON usage_records(workspace_id, created_at)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Migration(format!("idx_usage_workspace_created: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(())
    }
}
