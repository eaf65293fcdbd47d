//! The storage seam the proxy depends on

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{UsageRecord, Workspace};

/// Storage operations the proxy needs per request.
///
/// `month` is a `YYYY-MM` UTC month key. `insert_usage` is append-only;
/// implementations must never update existing ledger rows.
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// Load a workspace by id
    async fn workspace(&self, id: Uuid) -> Result<Workspace>;

    /// Total ledger cost for a workspace in the given month
    async fn monthly_cost(&self, workspace_id: Uuid, month: &str) -> Result<f64>;

    /// Append one record to the usage ledger
    async fn insert_usage(&self, record: &UsageRecord) -> Result<()>;
}
