//! The LLM proxy itself
//!
//! One request flows through six gates in a fixed order: validation,
//! sanitization, rate limiting, workspace load, quota check, then the
//! upstream call. Only a request that clears every gate reaches a provider,
//! and only a completed provider call writes a ledger row.

#[cfg(test)]
mod tests;

use daygent_crypto::ApiKeyCipher;
use daygent_llm::{
    validate, AdapterRegistry, AnthropicAdapter, AnthropicConfig, ChatRequest, ChatResponse,
    CostModel, OpenAiAdapter, OpenAiConfig, Provider, ProviderAdapter,
};
use daygent_store::{ProxyStore, UsageRecord, Workspace};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::rate_limit::{RateLimiter, RateLimiterStore};
use crate::usage::{UsageAlert, UsageMonitor, WorkspaceUsage};

/// One metered request through the proxy
#[derive(Debug, Clone)]
pub struct ProxyCall {
    /// Provider to dispatch to
    pub provider: Provider,
    /// Workspace the call is billed to
    pub workspace_id: Uuid,
    /// User making the call, if known
    pub user_id: Option<Uuid>,
    /// The chat request
    pub request: ChatRequest,
    /// Logical endpoint label recorded in the ledger
    pub endpoint: String,
    /// Cancellation handle; defaults to never cancelled
    pub cancel: CancellationToken,
}

impl ProxyCall {
    /// Create a call with the default endpoint label
    #[must_use]
    pub fn new(provider: Provider, workspace_id: Uuid, request: ChatRequest) -> Self {
        Self {
            provider,
            workspace_id,
            user_id: None,
            request,
            endpoint: "chat".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attribute the call to a user
    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the ledger endpoint label
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Metering attached to a successful response
#[derive(Debug, Clone, Serialize)]
pub struct UsageMeta {
    /// Provider that served the call
    pub provider: Provider,
    /// Model as requested
    pub model: String,
    /// Input tokens reported upstream
    pub input_tokens: u32,
    /// Output tokens reported upstream
    pub output_tokens: u32,
    /// Total tokens for the call
    pub total_tokens: u32,
    /// Cost in USD at current pricing
    pub estimated_cost: f64,
}

/// A successful proxied response with its metering
#[derive(Debug, Clone, Serialize)]
pub struct ProxyResponse {
    /// The provider response
    pub data: ChatResponse,
    /// Metering for this call
    pub usage: UsageMeta,
    /// Whether the response came from a cache (always false today)
    pub cached: bool,
    /// Proxy-assigned id for correlation
    pub request_id: Uuid,
    /// Usage alert crossed by this call, if any
    pub alert: Option<UsageAlert>,
}

/// The proxy: metered, rate-limited dispatch to LLM providers
pub struct LlmProxy {
    adapters: AdapterRegistry,
    store: Arc<dyn ProxyStore>,
    rate_limiter: RateLimiter,
    monitor: UsageMonitor,
    cost_model: CostModel,
    cipher: Option<ApiKeyCipher>,
    config: ProxyConfig,
}

impl LlmProxy {
    /// Create a proxy with both stock adapters registered
    pub fn new(config: ProxyConfig, store: Arc<dyn ProxyStore>) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let mut openai_config = OpenAiConfig::new().with_timeout(timeout);
        if let Some(base) = &config.openai_base_url {
            openai_config = openai_config.with_base_url(base);
        }
        let mut anthropic_config = AnthropicConfig::new().with_timeout(timeout);
        if let Some(base) = &config.anthropic_base_url {
            anthropic_config = anthropic_config.with_base_url(base);
        }

        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(
            OpenAiAdapter::new(openai_config).map_err(|e| ProxyError::Internal(e.to_string()))?,
        ));
        adapters.register(Arc::new(
            AnthropicAdapter::new(anthropic_config)
                .map_err(|e| ProxyError::Internal(e.to_string()))?,
        ));

        let cipher = config
            .master_key_base64
            .as_deref()
            .map(ApiKeyCipher::from_base64)
            .transpose()
            .map_err(|e| ProxyError::Internal(format!("master key: {}", e)))?;

        Ok(Self {
            adapters,
            store: store.clone(),
            rate_limiter: RateLimiter::new(config.rate_limits),
            monitor: UsageMonitor::new(store),
            cost_model: CostModel::new(),
            cipher,
            config,
        })
    }

    /// Register (or replace) an adapter
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.register(adapter);
        self
    }

    /// Swap the rate limiter's counter store
    #[must_use]
    pub fn with_rate_limiter_store(mut self, store: Box<dyn RateLimiterStore>) -> Self {
        self.rate_limiter = RateLimiter::with_store(self.config.rate_limits, store);
        self
    }

    /// Run one call through the full pipeline.
    ///
    /// Gate order is fixed: validation, sanitization, rate limit, workspace
    /// load, quota, credentials, dispatch. The rate-limit counter is bumped
    /// before the quota check, so quota-rejected requests still spend rate
    /// budget.
    #[instrument(skip(self, call), fields(
        workspace_id = %call.workspace_id,
        provider = %call.provider,
        model = %call.request.model,
        endpoint = %call.endpoint,
    ))]
    pub async fn process_request(&self, call: ProxyCall) -> Result<ProxyResponse> {
        validate(&call.request)?;

        let mut request = call.request.clone();
        daygent_llm::validate::sanitize_request(&mut request);

        self.rate_limiter
            .check_and_increment(call.workspace_id)
            .await
            .map_err(|retry_after_seconds| ProxyError::RateLimited {
                retry_after_seconds,
            })?;

        let workspace = self
            .store
            .workspace(call.workspace_id)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        let quota = self.monitor.check_quota(&workspace).await;
        if !quota.allowed {
            return Err(ProxyError::QuotaExceeded {
                message: quota
                    .message
                    .unwrap_or_else(|| "Monthly usage limit reached".to_string()),
            });
        }

        let api_key = self.resolve_api_key(&workspace, call.provider)?;

        let adapter = self.adapters.get(call.provider).ok_or_else(|| {
            ProxyError::Internal(format!("no adapter registered for {}", call.provider))
        })?;

        debug!("dispatching to provider");

        let response = tokio::select! {
            _ = call.cancel.cancelled() => {
                return Err(ProxyError::Provider(daygent_llm::Error::Cancelled));
            }
            result = adapter.send(&request, &api_key) => result?,
        };

        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));
        let cost = self.cost_model.cost(&request.model, input_tokens, output_tokens);

        let record = UsageRecord {
            id: Uuid::new_v4(),
            workspace_id: call.workspace_id,
            user_id: call.user_id,
            provider: call.provider,
            model: request.model.clone(),
            input_tokens,
            output_tokens,
            cost,
            endpoint: call.endpoint.clone(),
            created_at: chrono::Utc::now(),
        };

        // The caller already has a billable response at this point, so a
        // ledger failure is logged but never turns success into an error.
        if let Err(e) = self.store.insert_usage(&record).await {
            warn!(
                workspace_id = %call.workspace_id,
                error = %e,
                "failed to write usage record"
            );
        }

        let alert = Self::post_call_alert(&workspace, &quota.usage, cost);

        Ok(ProxyResponse {
            data: response,
            usage: UsageMeta {
                provider: call.provider,
                model: request.model,
                input_tokens,
                output_tokens,
                total_tokens: input_tokens + output_tokens,
                estimated_cost: cost,
            },
            cached: false,
            request_id: Uuid::new_v4(),
            alert,
        })
    }

    /// Pick the credential for a call: the workspace's own sealed key when it
    /// matches the requested provider, otherwise the platform fallback key.
    fn resolve_api_key(&self, workspace: &Workspace, provider: Provider) -> Result<String> {
        if let (Some(sealed), Some(ws_provider)) =
            (&workspace.api_key_sealed, workspace.api_provider)
        {
            if ws_provider == provider {
                match &self.cipher {
                    Some(cipher) => {
                        return cipher.open(sealed).map_err(|e| {
                            warn!(workspace_id = %workspace.id, error = %e, "failed to unseal workspace key");
                            ProxyError::Internal("failed to unseal workspace API key".to_string())
                        });
                    }
                    None => {
                        warn!(
                            workspace_id = %workspace.id,
                            "workspace has a sealed key but no master key is configured"
                        );
                    }
                }
            }
        }

        let fallback = match provider {
            Provider::OpenAi => &self.config.openai_fallback_key,
            Provider::Anthropic => &self.config.anthropic_fallback_key,
        };

        fallback
            .clone()
            .ok_or(ProxyError::NoCredentials { provider })
    }

    fn post_call_alert(
        workspace: &Workspace,
        before: &WorkspaceUsage,
        cost: f64,
    ) -> Option<UsageAlert> {
        if !workspace.usage_limit_enabled {
            return None;
        }

        let total_cost = before.total_cost + cost;
        let limit = workspace.usage_limit_monthly;
        let percentage_used = if limit > 0.0 {
            (total_cost / limit) * 100.0
        } else if total_cost > 0.0 {
            100.0
        } else {
            0.0
        };

        UsageMonitor::check_alert(&WorkspaceUsage {
            total_cost,
            limit,
            percentage_used,
            is_over_limit: total_cost >= limit,
        })
    }
}
