//! Per-domain pacing for polite crawling.
//!
//! Harvest runs many pages of the same site concurrently, so the raw
//! fetcher is wrapped with a pacer that enforces a minimum gap between
//! consecutive requests to the same host. The key is the frontier's
//! `main_domain` (the URL host), so `https://a.example/x` and
//! `http://a.example/y` share one budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::frontier::derive_main_domain;
use crate::traits::Fetcher;

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum gap between requests to the same host.
    pub delay: Duration,

    /// Random extra delay, uniform in `[0, jitter]`, added per request.
    /// Zero disables it.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand_jitter_ms(self.jitter.as_millis() as u64))
    }
}

impl Default for ThrottleConfig {
    /// One request per second per host, with up to 500ms of jitter.
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

/// [`Fetcher`] wrapper that paces requests per host.
///
/// Safe to clone and share across tasks: the last-request map is behind
/// an `Arc<Mutex>`, and the lock is released while sleeping so one slow
/// host cannot stall the others.
#[derive(Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    config: ThrottleConfig,
    last_request: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            last_request: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reserve the host's next send slot, then sleep until it arrives.
    ///
    /// The slot is written back while the lock is held, so concurrent
    /// callers queue behind one another instead of all measuring from
    /// the same last request and proceeding together.
    async fn pace(&self, host: &str) {
        let pause = {
            let mut map = self.last_request.lock().await;
            let now = Instant::now();
            let required = self.config.effective_delay();
            let slot = match map.get(host) {
                Some(&last) if last + required > now => last + required,
                _ => now,
            };
            map.insert(host.to_string(), slot);
            slot.saturating_duration_since(now)
        };

        if !pause.is_zero() {
            tracing::debug!(host = %host, pause_ms = %pause.as_millis(), "Pacing request");
            tokio::time::sleep(pause).await;
        }
    }
}

impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if let Ok(host) = derive_main_domain(url) {
            self.pace(&host).await;
        }
        self.inner.fetch(url).await
    }
}

// Jitter does not need real randomness; a xorshift over the clock keeps
// the `rand` crate out of the tree.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
