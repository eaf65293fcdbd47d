//! Daygent Proxy - Metered LLM Dispatch
//!
//! The request pipeline in front of LLM providers:
//! - Config: caps, timeouts and credentials
//! - Rate limit: per-workspace minute/hour/day windows
//! - Usage: monthly spend tracking and quota enforcement
//! - Proxy: the gate sequence tying it together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod proxy;
pub mod rate_limit;
pub mod usage;

pub use config::{ProxyConfig, RateLimitConfig};
pub use error::{ErrorPayload, ProxyError, Result};
pub use proxy::{LlmProxy, ProxyCall, ProxyResponse, UsageMeta};
pub use rate_limit::{
    InMemoryRateLimiterStore, RateLimiter, RateLimiterStore, WindowGranularity, WindowKey,
    WindowState,
};
pub use usage::{QuotaCheck, UsageAlert, UsageMonitor, WorkspaceUsage};
