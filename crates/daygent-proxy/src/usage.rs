//! Monthly usage tracking and quota enforcement
//!
//! Reads the workspace's month-to-date spend from the ledger aggregate and
//! decides whether a request may proceed. Aggregate failures fail open: a
//! broken usage query must not take the proxy down, so it is logged and
//! treated as zero usage.

use chrono::Utc;
use daygent_store::{ProxyStore, Workspace};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Alert thresholds, checked highest first
const ALERT_THRESHOLDS: [u8; 3] = [100, 90, 80];

/// A workspace's month-to-date spend against its limit
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceUsage {
    /// Month-to-date cost in USD
    pub total_cost: f64,
    /// Monthly limit in USD
    pub limit: f64,
    /// Spend as a percentage of the limit
    pub percentage_used: f64,
    /// Whether the limit is reached
    pub is_over_limit: bool,
}

impl WorkspaceUsage {
    fn unmetered(limit: f64) -> Self {
        Self {
            total_cost: 0.0,
            limit,
            percentage_used: 0.0,
            is_over_limit: false,
        }
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone)]
pub struct QuotaCheck {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The usage snapshot the decision was based on
    pub usage: WorkspaceUsage,
    /// Rejection message, set only when not allowed
    pub message: Option<String>,
}

/// A threshold crossing worth notifying the workspace about
#[derive(Debug, Clone, Serialize)]
pub struct UsageAlert {
    /// The highest crossed threshold (80, 90 or 100)
    pub threshold: u8,
    /// Human-readable alert text
    pub message: String,
}

/// Monitors monthly spend per workspace
pub struct UsageMonitor {
    store: Arc<dyn ProxyStore>,
}

impl UsageMonitor {
    /// Create a monitor over the given store
    #[must_use]
    pub fn new(store: Arc<dyn ProxyStore>) -> Self {
        Self { store }
    }

    /// Month key (`YYYY-MM`, UTC) for the current month
    #[must_use]
    pub fn current_month() -> String {
        Utc::now().format("%Y-%m").to_string()
    }

    /// Month-to-date usage for a workspace.
    ///
    /// Workspaces with the limit disabled skip the aggregate query entirely.
    /// An aggregate failure is logged and reported as zero usage.
    pub async fn current_usage(&self, workspace: &Workspace) -> WorkspaceUsage {
        if !workspace.usage_limit_enabled {
            return WorkspaceUsage::unmetered(workspace.usage_limit_monthly);
        }

        let month = Self::current_month();
        let total_cost = match self.store.monthly_cost(workspace.id, &month).await {
            Ok(total) => total,
            Err(e) => {
                warn!(
                    workspace_id = %workspace.id,
                    error = %e,
                    "usage aggregate failed, treating as zero usage"
                );
                0.0
            }
        };

        let limit = workspace.usage_limit_monthly;
        let percentage_used = if limit > 0.0 {
            (total_cost / limit) * 100.0
        } else if total_cost > 0.0 {
            100.0
        } else {
            0.0
        };

        WorkspaceUsage {
            total_cost,
            limit,
            percentage_used,
            is_over_limit: total_cost >= limit,
        }
    }

    /// Decide whether a request may proceed under the monthly limit
    pub async fn check_quota(&self, workspace: &Workspace) -> QuotaCheck {
        let usage = self.current_usage(workspace).await;

        if usage.is_over_limit {
            let message = format!(
                "Monthly usage limit of ${:.2} reached (${:.2} used). Requests resume next month or after a limit increase.",
                usage.limit, usage.total_cost
            );
            QuotaCheck {
                allowed: false,
                usage,
                message: Some(message),
            }
        } else {
            QuotaCheck {
                allowed: true,
                usage,
                message: None,
            }
        }
    }

    /// The highest crossed alert threshold for a usage snapshot, if any
    #[must_use]
    pub fn check_alert(usage: &WorkspaceUsage) -> Option<UsageAlert> {
        for threshold in ALERT_THRESHOLDS {
            if usage.percentage_used >= f64::from(threshold) {
                let message = match threshold {
                    100 => format!(
                        "Monthly usage limit reached: ${:.2} of ${:.2} used. Further requests will be rejected.",
                        usage.total_cost, usage.limit
                    ),
                    90 => format!(
                        "Workspace has used {:.0}% of its monthly limit (${:.2} of ${:.2}). Requests stop at 100%.",
                        usage.percentage_used, usage.total_cost, usage.limit
                    ),
                    _ => format!(
                        "Workspace has used {:.0}% of its monthly limit (${:.2} of ${:.2}).",
                        usage.percentage_used, usage.total_cost, usage.limit
                    ),
                };
                return Some(UsageAlert { threshold, message });
            }
        }
        None
    }
}
