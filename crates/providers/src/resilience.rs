//! Resilience wrapper for LLM providers.
//!
//! Composes four guards around any [`LlmProvider`]:
//! - **circuit breaker** - fail fast after N consecutive transient
//!   failures, re-probe after a cool-off window
//! - **retry** - jittered exponential backoff for transient errors
//! - **rate limit** - token bucket per provider
//! - **bulkhead** - cap on concurrent in-flight calls
//!
//! The streaming contract is preserved: an in-flight stream whose
//! breaker opens is terminated with a typed error event.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use pf_domain::config::ResilienceConfig;
use pf_domain::error::{Error, Result};
use pf_domain::stream::{BoxStream, StreamEvent};

use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Circuit breaker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
///
/// After the cool-off deadline passes, the next call is allowed through
/// as a probe; its outcome closes or re-opens the circuit.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    break_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, break_duration: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                open_until: None,
            }),
            threshold,
            break_duration,
        }
    }

    /// Whether calls are currently rejected.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        matches!(state.open_until, Some(until) if Instant::now() < until)
    }

    /// Fail fast when the circuit is open.
    fn check(&self, provider: &str) -> Result<()> {
        if self.is_open() {
            return Err(Error::Provider {
                provider: provider.to_string(),
                message: "circuit breaker open".into(),
            });
        }
        Ok(())
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.break_duration);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retry backoff
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Jittered exponential backoff for transient provider errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Compute the delay for the given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f64;
        let delay_ms = base_ms * 2f64.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_backoff.as_millis() as f64);

        // ~25% jitter to spread retry storms.
        let jitter = capped_ms * 0.25 * pseudo_random_fraction(attempt);
        Duration::from_millis((capped_ms + jitter) as u64)
    }
}

/// Cheap deterministic "random" fraction [0, 1) based on attempt number.
/// Not cryptographically secure - just enough to decorrelate retries.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761); // Knuth multiplicative hash
    (hash as f64) / (u32::MAX as f64)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token bucket
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Per-provider request rate limiter. `acquire` blocks (async) until a
/// token is available.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    rate_per_second: f64,
    burst: f64,
}

impl TokenBucket {
    pub fn new(rate_per_second: u32, burst: u32) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
            rate_per_second: rate_per_second as f64,
            burst: burst.max(1) as f64,
        }
    }

    /// Take one token, waiting for refill when the bucket is dry.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.burst);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.rate_per_second,
                    ))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ResilientProvider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wraps an [`LlmProvider`] with breaker, retry, rate-limit, and
/// bulkhead guards. Transparent to callers: same trait, same name.
pub struct ResilientProvider {
    inner: Arc<dyn LlmProvider>,
    breaker: Arc<CircuitBreaker>,
    limiter: Option<Arc<TokenBucket>>,
    bulkhead: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ResilientProvider {
    pub fn wrap(inner: Arc<dyn LlmProvider>, config: &ResilienceConfig) -> Self {
        let limiter = if config.rate_per_second > 0 {
            Some(Arc::new(TokenBucket::new(
                config.rate_per_second,
                config.burst,
            )))
        } else {
            None
        };

        Self {
            inner,
            breaker: Arc::new(CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_secs(config.break_seconds),
            )),
            limiter,
            bulkhead: Arc::new(Semaphore::new(config.max_concurrent.max(1) as usize)),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                initial_backoff: Duration::from_millis(config.initial_backoff_ms),
                max_backoff: Duration::from_millis(config.max_backoff_ms),
            },
        }
    }

    async fn admit(&self) -> Result<tokio::sync::OwnedSemaphorePermit> {
        let permit = self
            .bulkhead
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("bulkhead semaphore closed".into()))?;
        if let Some(ref limiter) = self.limiter {
            limiter.acquire().await;
        }
        Ok(permit)
    }
}

#[async_trait::async_trait]
impl LlmProvider for ResilientProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let _permit = self.admit().await?;

        let mut attempt = 0u32;
        loop {
            self.breaker.check(self.inner.name())?;

            match self.inner.generate(req.clone()).await {
                Ok(resp) => {
                    self.breaker.record_success();
                    return Ok(resp);
                }
                Err(e) if e.is_transient() => {
                    self.breaker.record_failure();
                    if attempt >= self.retry.max_retries {
                        return Err(e);
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        provider = %self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn generate_stream(
        &self,
        req: GenerateRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let permit = self.admit().await?;
        self.breaker.check(self.inner.name())?;

        let mut inner_stream = match self.inner.generate_stream(req).await {
            Ok(s) => s,
            Err(e) => {
                if e.is_transient() {
                    self.breaker.record_failure();
                }
                return Err(e);
            }
        };

        let breaker = self.breaker.clone();
        let stream = async_stream::stream! {
            // Hold the bulkhead slot for the stream's whole lifetime.
            let _permit = permit;

            while let Some(item) = inner_stream.next().await {
                if breaker.is_open() {
                    yield Ok(StreamEvent::Error {
                        message: "circuit breaker open".into(),
                    });
                    return;
                }
                match item {
                    Ok(event) => {
                        if matches!(event, StreamEvent::Done { .. }) {
                            breaker.record_success();
                        }
                        yield Ok(event);
                    }
                    Err(e) => {
                        if e.is_transient() {
                            breaker.record_failure();
                        }
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
