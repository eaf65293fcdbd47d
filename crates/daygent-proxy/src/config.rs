//! Proxy configuration

use daygent_llm::util::mask_api_key;
use std::fmt;

/// Per-window request caps for one workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling minute window
    pub per_minute: u32,
    /// Requests allowed per rolling hour window
    pub per_hour: u32,
    /// Requests allowed per rolling day window
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 20,
            per_hour: 100,
            per_day: 1000,
        }
    }
}

/// Top-level proxy configuration
#[derive(Clone)]
pub struct ProxyConfig {
    /// Per-workspace request caps
    pub rate_limits: RateLimitConfig,
    /// Upstream request timeout in seconds
    pub request_timeout_secs: u64,
    /// OpenAI base URL override
    pub openai_base_url: Option<String>,
    /// Anthropic base URL override
    pub anthropic_base_url: Option<String>,
    /// Platform OpenAI key used when a workspace has no key of its own
    pub openai_fallback_key: Option<String>,
    /// Platform Anthropic key used when a workspace has no key of its own
    pub anthropic_fallback_key: Option<String>,
    /// Base64 master key for unsealing workspace credentials
    pub master_key_base64: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("rate_limits", &self.rate_limits)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field(
                "openai_fallback_key",
                &self.openai_fallback_key.as_deref().map(mask_api_key),
            )
            .field(
                "anthropic_fallback_key",
                &self.anthropic_fallback_key.as_deref().map(mask_api_key),
            )
            .field(
                "master_key_base64",
                &self.master_key_base64.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitConfig::default(),
            request_timeout_secs: 10,
            openai_base_url: None,
            anthropic_base_url: None,
            openai_fallback_key: None,
            anthropic_fallback_key: None,
            master_key_base64: None,
        }
    }
}

impl ProxyConfig {
    /// Create a configuration with default caps and no credentials
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and `DAYGENT_MASTER_KEY`,
    /// all optional. Workspaces without their own key simply get
    /// `no_credentials` for providers with no fallback key set.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            openai_fallback_key: std::env::var("OPENAI_API_KEY").ok(),
            anthropic_fallback_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            master_key_base64: std::env::var("DAYGENT_MASTER_KEY").ok(),
            ..Self::default()
        }
    }

    /// Override the per-workspace caps
    #[must_use]
    pub fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Override the upstream request timeout
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the platform OpenAI fallback key
    #[must_use]
    pub fn with_openai_key(mut self, key: impl Into<String>) -> Self {
        self.openai_fallback_key = Some(key.into());
        self
    }

    /// Set the platform Anthropic fallback key
    #[must_use]
    pub fn with_anthropic_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_fallback_key = Some(key.into());
        self
    }

    /// Set the master key used to unseal workspace credentials
    #[must_use]
    pub fn with_master_key(mut self, key_base64: impl Into<String>) -> Self {
        self.master_key_base64 = Some(key_base64.into());
        self
    }
}
