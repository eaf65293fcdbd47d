//! Provider identification and the adapter seam
//!
//! [`Provider`] is the closed set of upstream vendors the proxy can dispatch
//! to. [`ProviderAdapter`] is the trait every vendor integration implements,
//! and [`AdapterRegistry`] maps providers to adapters so dispatch is a table
//! lookup rather than string branching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::request::{ChatRequest, ChatResponse};

/// An upstream LLM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions API
    OpenAi,
    /// Anthropic messages API
    Anthropic,
}

impl Provider {
    /// Canonical lowercase name, matching the wire and storage representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Parse a provider name. Case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vendor integration that can carry a chat request upstream
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter speaks to
    fn provider(&self) -> Provider;

    /// Send a chat request upstream with the given credential.
    ///
    /// The key is passed per-call rather than held by the adapter: one adapter
    /// instance serves every workspace, each with its own credential.
    async fn send(&self, request: &ChatRequest, api_key: &str) -> Result<ChatResponse>;
}

/// Lookup table from [`Provider`] to its adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any existing one for the same provider
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Look up the adapter for a provider
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Registered providers, in no particular order
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::request::ChatRequest;

    struct FakeAdapter(Provider);

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn send(&self, _request: &ChatRequest, _api_key: &str) -> Result<ChatResponse> {
            Err(Error::NotConfigured("fake".to_string()))
        }
    }

    #[test]
    fn test_provider_round_trip() {
        assert_eq!(Provider::parse("openai"), Some(Provider::OpenAi));
        assert_eq!(Provider::parse("Anthropic"), Some(Provider::Anthropic));
        assert_eq!(Provider::parse("mistral"), None);
        assert_eq!(Provider::OpenAi.as_str(), "openai");
        assert_eq!(Provider::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_provider_serde_lowercase() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let p: Provider = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.get(Provider::OpenAi).is_none());

        registry.register(Arc::new(FakeAdapter(Provider::OpenAi)));
        assert!(registry.get(Provider::OpenAi).is_some());
        assert!(registry.get(Provider::Anthropic).is_none());

        registry.register(Arc::new(FakeAdapter(Provider::Anthropic)));
        assert_eq!(registry.providers().len(), 2);
    }
}
