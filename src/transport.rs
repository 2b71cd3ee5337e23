//! Rate-limited HTTP transport
//!
//! Every outgoing request passes through a single pacer: one request is
//! released per tick, a missed tick earns no credit. Concurrent callers
//! queue FIFO on the pacer's mutex.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Pacer releasing at most one permit per tick, with no accumulation
pub struct RateLimiter {
    last_release: Mutex<Option<Instant>>,
    tick: Duration,
}

impl RateLimiter {
    pub fn new(tick: Duration) -> Self {
        Self {
            last_release: Mutex::new(None),
            tick,
        }
    }

    /// Suspend until the next tick is available
    pub async fn wait(&self) {
        let mut last = self.last_release.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.tick {
                let wait_time = self.tick - elapsed;
                tracing::trace!("rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// HTTP client that serializes request emission through the tick source
pub struct RateLimitedClient {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl RateLimitedClient {
    /// Build a client with the given tick period and per-request timeout.
    pub fn new(tick: Duration, request_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(tick),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Wait for the next tick, then issue the request.
    pub async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.limiter.wait().await;
        self.client.execute(request).await
    }
}
