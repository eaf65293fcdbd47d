//! Daygent Store - Persistence
//!
//! Workspaces and the append-only usage ledger behind the LLM proxy:
//! - Types: `Workspace` and `UsageRecord`
//! - Store: the `ProxyStore` trait the proxy depends on
//! - Sqlite: the SQLite-backed implementation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use store::ProxyStore;
pub use types::{UsageRecord, Workspace};
