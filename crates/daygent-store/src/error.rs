//! Store error types

use thiserror::Error;
use uuid::Uuid;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// No workspace row exists for the given id
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(Uuid),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded into its domain type
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Database migration failed
    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
