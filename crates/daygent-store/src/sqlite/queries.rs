use super::SqliteStore;
use crate::error::{Result, StoreError};
use crate::store::ProxyStore;
use crate::types::{ModelUsage, UsageRecord, Workspace};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daygent_llm::Provider;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    name: String,
    usage_limit_monthly: f64,
    usage_limit_enabled: bool,
    api_key_sealed: Option<String>,
    api_provider: Option<String>,
    agent_context: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = StoreError;

    fn try_from(row: WorkspaceRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::InvalidRow(format!("workspace id: {}", e)))?;
        let api_provider = row
            .api_provider
            .as_deref()
            .map(|p| {
                Provider::parse(p)
                    .ok_or_else(|| StoreError::InvalidRow(format!("unknown provider: {}", p)))
            })
            .transpose()?;

        Ok(Workspace {
            id,
            name: row.name,
            usage_limit_monthly: row.usage_limit_monthly,
            usage_limit_enabled: row.usage_limit_enabled,
            api_key_sealed: row.api_key_sealed,
            api_provider,
            agent_context: row.agent_context,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    id: String,
    workspace_id: String,
    user_id: Option<String>,
    provider: String,
    model: String,
    input_tokens: i64,
    output_tokens: i64,
    cost: f64,
    endpoint: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = StoreError;

    fn try_from(row: UsageRow) -> Result<Self> {
        Ok(UsageRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| StoreError::InvalidRow(format!("usage id: {}", e)))?,
            workspace_id: Uuid::parse_str(&row.workspace_id)
                .map_err(|e| StoreError::InvalidRow(format!("usage workspace_id: {}", e)))?,
            user_id: row
                .user_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|e| StoreError::InvalidRow(format!("usage user_id: {}", e)))?,
            provider: Provider::parse(&row.provider)
                .ok_or_else(|| StoreError::InvalidRow(format!("unknown provider: {}", row.provider)))?,
            model: row.model,
            input_tokens: row.input_tokens as u32,
            output_tokens: row.output_tokens as u32,
            cost: row.cost,
            endpoint: row.endpoint,
            created_at: row.created_at,
        })
    }
}

impl SqliteStore {
    /// Create a workspace
    pub async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workspaces (
                id, name, usage_limit_monthly, usage_limit_enabled,
                api_key_sealed, api_provider, agent_context, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(workspace.id.to_string())
        .bind(&workspace.name)
        .bind(workspace.usage_limit_monthly)
        .bind(workspace.usage_limit_enabled)
        .bind(&workspace.api_key_sealed)
        .bind(workspace.api_provider.map(|p| p.as_str()))
        .bind(&workspace.agent_context)
        .bind(workspace.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update a workspace's monthly limit and whether it is enforced
    pub async fn update_limits(
        &self,
        id: Uuid,
        usage_limit_monthly: f64,
        usage_limit_enabled: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE workspaces SET usage_limit_monthly = ?, usage_limit_enabled = ? WHERE id = ?",
        )
        .bind(usage_limit_monthly)
        .bind(usage_limit_enabled)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WorkspaceNotFound(id));
        }

        Ok(())
    }

    /// Set (or clear) a workspace's sealed API key and its provider
    pub async fn set_api_key(
        &self,
        id: Uuid,
        api_key_sealed: Option<String>,
        api_provider: Option<Provider>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE workspaces SET api_key_sealed = ?, api_provider = ? WHERE id = ?")
                .bind(api_key_sealed)
                .bind(api_provider.map(|p| p.as_str()))
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WorkspaceNotFound(id));
        }

        Ok(())
    }

    /// Per-model usage breakdown for a workspace in a `YYYY-MM` month
    pub async fn usage_for_month(
        &self,
        workspace_id: Uuid,
        month: &str,
    ) -> Result<Vec<ModelUsage>> {
        let rows: Vec<ModelUsage> = sqlx::query_as(
            r#"
            SELECT
                provider,
                model,
                COUNT(*) AS requests,
                COALESCE(SUM(input_tokens), 0) AS input_tokens,
                COALESCE(SUM(output_tokens), 0) AS output_tokens,
                COALESCE(SUM(cost), 0.0) AS cost
            FROM usage_records
            WHERE workspace_id = ? AND strftime('%Y-%m', created_at) = ?
            GROUP BY provider, model
            ORDER BY cost DESC
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(month)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Recent ledger rows for a workspace, newest first
    pub async fn recent_usage(&self, workspace_id: Uuid, limit: i64) -> Result<Vec<UsageRecord>> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT * FROM usage_records
            WHERE workspace_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl ProxyStore for SqliteStore {
    async fn workspace(&self, id: Uuid) -> Result<Workspace> {
        let row: WorkspaceRow = sqlx::query_as("SELECT * FROM workspaces WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::WorkspaceNotFound(id))?;

        row.try_into()
    }

    async fn monthly_cost(&self, workspace_id: Uuid, month: &str) -> Result<f64> {
        let (total,): (f64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(cost), 0.0)
            FROM usage_records
            WHERE workspace_id = ? AND strftime('%Y-%m', created_at) = ?
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(month)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                id, workspace_id, user_id, provider, model,
                input_tokens, output_tokens, cost, endpoint, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.workspace_id.to_string())
        .bind(record.user_id.map(|u| u.to_string()))
        .bind(record.provider.as_str())
        .bind(&record.model)
        .bind(record.input_tokens as i64)
        .bind(record.output_tokens as i64)
        .bind(record.cost)
        .bind(&record.endpoint)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
