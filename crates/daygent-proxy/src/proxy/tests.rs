use super::*;
use crate::config::RateLimitConfig;
use async_trait::async_trait;
use daygent_llm::{Choice, Message, TokenUsage};
use daygent_store::{SqliteStore, StoreError};
use std::sync::Mutex;
use uuid::Uuid;

/// Adapter that returns a canned response and records the key it was given
struct FakeAdapter {
    provider: Provider,
    last_key: Mutex<Option<String>>,
    delay: Option<Duration>,
}

impl FakeAdapter {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            last_key: Mutex::new(None),
            delay: None,
        }
    }

    fn slow(provider: Provider, delay: Duration) -> Self {
        Self {
            provider,
            last_key: Mutex::new(None),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(
        &self,
        request: &ChatRequest,
        api_key: &str,
    ) -> daygent_llm::Result<ChatResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *self.last_key.lock().unwrap() = Some(api_key.to_string());
        Ok(ChatResponse {
            id: "resp-1".to_string(),
            model: request.model.clone(),
            created: 1_700_000_000,
            choices: vec![Choice {
                message: Message::assistant("ok"),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(TokenUsage {
                input_tokens: 1000,
                output_tokens: 500,
                total_tokens: 1500,
            }),
        })
    }
}

/// Store wrapper whose ledger writes always fail
struct BrokenLedgerStore {
    inner: SqliteStore,
}

#[async_trait]
impl ProxyStore for BrokenLedgerStore {
    async fn workspace(&self, id: Uuid) -> daygent_store::Result<Workspace> {
        self.inner.workspace(id).await
    }

    async fn monthly_cost(&self, workspace_id: Uuid, month: &str) -> daygent_store::Result<f64> {
        self.inner.monthly_cost(workspace_id, month).await
    }

    async fn insert_usage(&self, _record: &UsageRecord) -> daygent_store::Result<()> {
        Err(StoreError::InvalidRow("disk full".to_string()))
    }
}

async fn store_with_workspace(limit: f64) -> (Arc<SqliteStore>, Workspace) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let ws = Workspace::new("test", limit);
    store.create_workspace(&ws).await.unwrap();
    (store, ws)
}

fn proxy_with_fake(
    config: ProxyConfig,
    store: Arc<SqliteStore>,
    adapter: Arc<FakeAdapter>,
) -> LlmProxy {
    LlmProxy::new(config, store).unwrap().with_adapter(adapter)
}

fn chat_request() -> ChatRequest {
    ChatRequest::new("gpt-4o").with_message(Message::user("hello"))
}

#[tokio::test]
async fn test_success_writes_exactly_one_ledger_row() {
    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    let call = ProxyCall::new(Provider::OpenAi, ws.id, chat_request());
    let response = proxy.process_request(call).await.unwrap();

    assert_eq!(response.data.first_content(), Some("ok"));
    assert!(!response.cached);
    assert_eq!(response.usage.input_tokens, 1000);
    assert_eq!(response.usage.output_tokens, 500);
    assert_eq!(response.usage.total_tokens, 1500);
    // gpt-4o: (1000 * 2.50 + 500 * 10.00) / 1M
    assert!((response.usage.estimated_cost - 0.0075).abs() < 1e-9);

    let rows = store.recent_usage(ws.id, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model, "gpt-4o");
    assert!((rows[0].cost - response.usage.estimated_cost).abs() < 1e-12);
}

#[tokio::test]
async fn test_validation_rejects_before_anything_runs() {
    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    let request = ChatRequest::new("").with_message(Message::user("hello"));
    let err = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, request))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "validation");
    assert!(store.recent_usage(ws.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_rejection_writes_no_ledger_row() {
    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let config = ProxyConfig::new()
        .with_openai_key("sk-platform-key-123")
        .with_rate_limits(RateLimitConfig {
            per_minute: 1,
            per_hour: 100,
            per_day: 1000,
        });
    let proxy = proxy_with_fake(config, store.clone(), adapter);

    proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap();

    let err = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "rate_limited");
    assert!(err.retry_after_seconds().unwrap() >= 1);
    assert_eq!(store.recent_usage(ws.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_quota_rejection_writes_no_ledger_row() {
    let (store, ws) = store_with_workspace(10.0).await;
    // Spend the whole monthly budget up front
    store
        .insert_usage(&UsageRecord {
            id: Uuid::new_v4(),
            workspace_id: ws.id,
            user_id: None,
            provider: Provider::OpenAi,
            model: "gpt-4o".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost: 10.0,
            endpoint: "chat".to_string(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    let err = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "quota_exceeded");
    assert!(err.to_string().contains("10.00"));
    assert_eq!(store.recent_usage(ws.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_quota_rejections_still_spend_rate_budget() {
    let (store, ws) = store_with_workspace(10.0).await;
    store
        .insert_usage(&UsageRecord {
            id: Uuid::new_v4(),
            workspace_id: ws.id,
            user_id: None,
            provider: Provider::OpenAi,
            model: "gpt-4o".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost: 10.0,
            endpoint: "chat".to_string(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let config = ProxyConfig::new()
        .with_openai_key("sk-platform-key-123")
        .with_rate_limits(RateLimitConfig {
            per_minute: 2,
            per_hour: 100,
            per_day: 1000,
        });
    let proxy = proxy_with_fake(config, store.clone(), adapter);

    for _ in 0..2 {
        let err = proxy
            .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "quota_exceeded");
    }

    // Rate budget was spent by the quota-rejected calls
    let err = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "rate_limited");
}

#[tokio::test]
async fn test_no_credentials_for_provider() {
    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(FakeAdapter::new(Provider::Anthropic));
    // Only an OpenAI fallback key is configured
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    let request = ChatRequest::new("claude-3-haiku-20240307").with_message(Message::user("hi"));
    let err = proxy
        .process_request(ProxyCall::new(Provider::Anthropic, ws.id, request))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "no_credentials");
    assert!(store.recent_usage(ws.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_workspace_key_preferred_over_fallback() {
    let master = daygent_crypto::generate_master_key();
    let master_b64 = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(master)
    };
    let cipher = ApiKeyCipher::from_key(master);
    let sealed = cipher.seal("sk-workspace-own-key").unwrap();

    let (store, ws) = store_with_workspace(10.0).await;
    store
        .set_api_key(ws.id, Some(sealed), Some(Provider::OpenAi))
        .await
        .unwrap();

    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let config = ProxyConfig::new()
        .with_openai_key("sk-platform-key-123")
        .with_master_key(master_b64);
    let proxy = proxy_with_fake(config, store.clone(), adapter.clone());

    proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap();

    assert_eq!(
        adapter.last_key.lock().unwrap().as_deref(),
        Some("sk-workspace-own-key")
    );
}

#[tokio::test]
async fn test_mismatched_workspace_key_uses_fallback() {
    let master = daygent_crypto::generate_master_key();
    let master_b64 = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(master)
    };
    let sealed = ApiKeyCipher::from_key(master)
        .seal("sk-anthropic-only")
        .unwrap();

    let (store, ws) = store_with_workspace(10.0).await;
    store
        .set_api_key(ws.id, Some(sealed), Some(Provider::Anthropic))
        .await
        .unwrap();

    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let config = ProxyConfig::new()
        .with_openai_key("sk-platform-key-123")
        .with_master_key(master_b64);
    let proxy = proxy_with_fake(config, store.clone(), adapter.clone());

    proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap();

    assert_eq!(
        adapter.last_key.lock().unwrap().as_deref(),
        Some("sk-platform-key-123")
    );
}

#[tokio::test]
async fn test_ledger_failure_still_returns_response() {
    let inner = SqliteStore::in_memory().await.unwrap();
    let ws = Workspace::new("test", 10.0);
    inner.create_workspace(&ws).await.unwrap();
    let store: Arc<dyn ProxyStore> = Arc::new(BrokenLedgerStore { inner });

    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let proxy = LlmProxy::new(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store,
    )
    .unwrap()
    .with_adapter(adapter);

    let response = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap();
    assert_eq!(response.data.first_content(), Some("ok"));
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(FakeAdapter::slow(
        Provider::OpenAi,
        Duration::from_secs(30),
    ));
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let call = ProxyCall::new(Provider::OpenAi, ws.id, chat_request()).with_cancellation(cancel);
    let err = proxy.process_request(call).await.unwrap_err();

    assert!(matches!(
        err,
        ProxyError::Provider(daygent_llm::Error::Cancelled)
    ));
    assert!(store.recent_usage(ws.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_alert_fires_when_call_crosses_threshold() {
    let (store, ws) = store_with_workspace(0.008).await;
    let adapter = Arc::new(FakeAdapter::new(Provider::OpenAi));
    let proxy = proxy_with_fake(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store.clone(),
        adapter,
    );

    // The call costs $0.0075 against a $0.008 limit: 93% used afterwards
    let response = proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, chat_request()))
        .await
        .unwrap();

    let alert = response.alert.unwrap();
    assert_eq!(alert.threshold, 90);
}

#[tokio::test]
async fn test_sanitized_prompt_reaches_adapter() {
    struct CapturingAdapter {
        seen: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ProviderAdapter for CapturingAdapter {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn send(
            &self,
            request: &ChatRequest,
            _api_key: &str,
        ) -> daygent_llm::Result<ChatResponse> {
            *self.seen.lock().unwrap() = Some(request.messages[0].content.clone());
            Ok(ChatResponse {
                id: "resp-2".to_string(),
                model: request.model.clone(),
                created: 0,
                choices: vec![Choice {
                    message: Message::assistant("ok"),
                    finish_reason: None,
                }],
                usage: None,
            })
        }
    }

    let (store, ws) = store_with_workspace(10.0).await;
    let adapter = Arc::new(CapturingAdapter {
        seen: Mutex::new(None),
    });
    let proxy = LlmProxy::new(
        ProxyConfig::new().with_openai_key("sk-platform-key-123"),
        store,
    )
    .unwrap()
    .with_adapter(adapter.clone());

    let request = ChatRequest::new("gpt-4o")
        .with_message(Message::user("hi <script>alert(1)</script> there"));
    proxy
        .process_request(ProxyCall::new(Provider::OpenAi, ws.id, request))
        .await
        .unwrap();

    let seen = adapter.seen.lock().unwrap().clone().unwrap();
    assert!(!seen.contains("<script>"));
    assert!(seen.contains("hi"));
    assert!(seen.contains("there"));
}
