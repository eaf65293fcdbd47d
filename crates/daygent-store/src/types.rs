//! Domain types persisted by the store

use chrono::{DateTime, Utc};
use daygent_llm::Provider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant workspace with its usage policy and optional own credential.
///
/// `api_key_sealed` is the encrypted credential envelope; the store never
/// sees plaintext keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Monthly spend limit in USD
    pub usage_limit_monthly: f64,
    /// Whether the monthly limit is enforced
    pub usage_limit_enabled: bool,
    /// Sealed (encrypted) workspace API key, if the tenant brought their own
    pub api_key_sealed: Option<String>,
    /// Provider the sealed key belongs to
    pub api_provider: Option<Provider>,
    /// Optional agent context prepended by callers
    pub agent_context: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a workspace with the default usage policy (limit enforced)
    #[must_use]
    pub fn new(name: impl Into<String>, usage_limit_monthly: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            usage_limit_monthly,
            usage_limit_enabled: true,
            api_key_sealed: None,
            api_provider: None,
            agent_context: None,
            created_at: Utc::now(),
        }
    }
}

/// One row in the append-only usage ledger.
///
/// Cost is computed once at write time; ledger rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record id
    pub id: Uuid,
    /// Workspace the call was billed to
    pub workspace_id: Uuid,
    /// User who made the call, if known
    pub user_id: Option<Uuid>,
    /// Upstream provider
    pub provider: Provider,
    /// Model name as requested
    pub model: String,
    /// Input tokens reported by the provider
    pub input_tokens: u32,
    /// Output tokens reported by the provider
    pub output_tokens: u32,
    /// Cost in USD at the pricing in effect when the call completed
    pub cost: f64,
    /// Logical endpoint the call came through
    pub endpoint: String,
    /// When the call completed
    pub created_at: DateTime<Utc>,
}

/// Per-model usage totals within a month, for reporting
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModelUsage {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Number of calls
    pub requests: i64,
    /// Summed input tokens
    pub input_tokens: i64,
    /// Summed output tokens
    pub output_tokens: i64,
    /// Summed cost in USD
    pub cost: f64,
}
