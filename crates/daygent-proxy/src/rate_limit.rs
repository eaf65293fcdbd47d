//! Per-workspace request-rate limiter
//!
//! Three concurrent rolling windows (minute, hour, day), each anchored at the
//! first request of the window and rolled over lazily on the next check.
//! Counter state lives behind [`RateLimiterStore`] so the in-memory map can
//! be swapped for a shared backend without touching the limiter logic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::RateLimitConfig;

/// Window sizes the limiter enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowGranularity {
    /// Rolling minute
    Minute,
    /// Rolling hour
    Hour,
    /// Rolling day
    Day,
}

impl WindowGranularity {
    /// Length of this window
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            WindowGranularity::Minute => Duration::seconds(60),
            WindowGranularity::Hour => Duration::seconds(3600),
            WindowGranularity::Day => Duration::seconds(86_400),
        }
    }

    fn cap(&self, limits: &RateLimitConfig) -> u32 {
        match self {
            WindowGranularity::Minute => limits.per_minute,
            WindowGranularity::Hour => limits.per_hour,
            WindowGranularity::Day => limits.per_day,
        }
    }

    const ALL: [WindowGranularity; 3] = [
        WindowGranularity::Minute,
        WindowGranularity::Hour,
        WindowGranularity::Day,
    ];
}

/// Identifies one counter: a workspace's window at one granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    /// Workspace being limited
    pub workspace_id: Uuid,
    /// Which window
    pub granularity: WindowGranularity,
}

/// Counter state for one window
#[derive(Debug, Clone, Copy)]
pub struct WindowState {
    /// Requests admitted in the current window
    pub count: u32,
    /// When the current window opened
    pub window_start: DateTime<Utc>,
}

/// Counter storage behind the limiter
#[async_trait]
pub trait RateLimiterStore: Send + Sync {
    /// Current state for a key, if any
    async fn get(&self, key: &WindowKey) -> Option<WindowState>;

    /// Atomically bump the counter for `key`. If the stored window opened
    /// earlier than `now` minus the window length, a fresh window starting at
    /// `now` replaces it first. Returns the post-increment state.
    async fn increment(&self, key: &WindowKey, now: DateTime<Utc>) -> WindowState;

    /// Drop state for a key
    async fn reset(&self, key: &WindowKey);
}

/// In-memory counter store
#[derive(Default)]
pub struct InMemoryRateLimiterStore {
    windows: Mutex<HashMap<WindowKey, WindowState>>,
}

impl InMemoryRateLimiterStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiterStore for InMemoryRateLimiterStore {
    async fn get(&self, key: &WindowKey) -> Option<WindowState> {
        self.windows.lock().await.get(key).copied()
    }

    async fn increment(&self, key: &WindowKey, now: DateTime<Utc>) -> WindowState {
        let mut windows = self.windows.lock().await;
        let window = key.granularity.duration();
        let state = windows
            .entry(*key)
            .and_modify(|s| {
                if now - s.window_start >= window {
                    s.count = 0;
                    s.window_start = now;
                }
                s.count += 1;
            })
            .or_insert(WindowState {
                count: 1,
                window_start: now,
            });
        *state
    }

    async fn reset(&self, key: &WindowKey) {
        self.windows.lock().await.remove(key);
    }
}

/// The rate limiter itself: per-workspace caps over three windows
pub struct RateLimiter {
    store: Box<dyn RateLimiterStore>,
    limits: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter over the in-memory store
    #[must_use]
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            store: Box::new(InMemoryRateLimiterStore::new()),
            limits,
        }
    }

    /// Create a limiter over a custom counter store
    #[must_use]
    pub fn with_store(limits: RateLimitConfig, store: Box<dyn RateLimiterStore>) -> Self {
        Self { store, limits }
    }

    /// Admit or reject one request for a workspace.
    ///
    /// All three windows are checked first; only an admitted request bumps
    /// any counter. On rejection the error carries seconds until the nearest
    /// exhausted window resets.
    pub async fn check_and_increment(&self, workspace_id: Uuid) -> Result<(), u64> {
        self.check_and_increment_at(workspace_id, Utc::now()).await
    }

    /// Same as [`check_and_increment`](Self::check_and_increment) with an
    /// explicit clock, so window math is testable.
    pub async fn check_and_increment_at(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), u64> {
        let mut nearest_reset: Option<u64> = None;

        for granularity in WindowGranularity::ALL {
            let key = WindowKey {
                workspace_id,
                granularity,
            };
            let window = granularity.duration();

            if let Some(state) = self.store.get(&key).await {
                let expired = now - state.window_start >= window;
                if !expired && state.count >= granularity.cap(&self.limits) {
                    let reset_in = (state.window_start + window - now).num_seconds().max(1) as u64;
                    nearest_reset = Some(match nearest_reset {
                        Some(current) => current.min(reset_in),
                        None => reset_in,
                    });
                }
            }
        }

        if let Some(retry_after) = nearest_reset {
            return Err(retry_after);
        }

        for granularity in WindowGranularity::ALL {
            let key = WindowKey {
                workspace_id,
                granularity,
            };
            self.store.increment(&key, now).await;
        }

        Ok(())
    }
}
