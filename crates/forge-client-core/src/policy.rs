use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use reqwest::Response;
use tokio_util::sync::CancellationToken;

use crate::breaker::{Admission, CircuitBreaker};
use crate::error::{is_breaker_failure_status, is_retriable_status, Error, Result};
use crate::validator::parse_retry_after;

/// Default per-attempt timeout: deliberately above the upstream gateway's 10-second ceiling,
/// so that the interposer observes upstream 504s as HTTP responses rather than local timeouts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const RETRY_COUNT: u32 = 5;
const BASE_DELAY_MS: u64 = 500;
const MULTIPLIER_MS: u64 = 1000;

/// Composition of `breaker(retry(timeout(send)))` over a single HTTP send attempt.
///
/// Each call to [`ResiliencyPolicy::execute`] is one logical outbound request: the breaker
/// observes exactly one outcome per call (its final one, after all retries are exhausted or
/// a response stops being retriable), while the retry layer may invoke `attempt` up to six
/// times (1 initial + 5 retries) and the timeout layer bounds every individual invocation.
pub(crate) struct ResiliencyPolicy {
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
}

impl ResiliencyPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            breaker: Arc::new(CircuitBreaker::new()),
        }
    }

    /// Runs `attempt` under the full breaker/retry/timeout composition.
    ///
    /// `attempt` must be callable any number of times; each call should build and send a
    /// fresh HTTP request (a `reqwest::Request` cannot generally be replayed).
    pub async fn execute<F>(&self, attempt: F, cancel: &CancellationToken) -> Result<Response>
    where
        F: Fn() -> BoxFuture<'static, reqwest::Result<Response>>,
    {
        match self.breaker.admit().await {
            Admission::Rejected => {
                tracing::warn!("circuit breaker open, failing fast without network I/O");
                return Err(Error::CircuitOpen);
            }
            Admission::Proceed => {}
        }

        let outcome = self.run_with_retry(&attempt, cancel).await;
        self.record_outcome(&outcome).await;
        outcome
    }

    async fn record_outcome(&self, outcome: &Result<Response>) {
        match outcome {
            Ok(response) if !is_breaker_failure_status(response.status().as_u16()) => {
                self.breaker.record_success().await;
            }
            Err(Error::Cancelled) => {
                // Cancellation reflects the caller giving up, not the upstream failing.
            }
            _ => self.breaker.record_failure().await,
        }
    }

    async fn run_with_retry<F>(&self, attempt: &F, cancel: &CancellationToken) -> Result<Response>
    where
        F: Fn() -> BoxFuture<'static, reqwest::Result<Response>>,
    {
        let mut pending_retry_after: Option<Duration> = None;

        for n in 0..=RETRY_COUNT {
            if n > 0 {
                let sleep_duration = backoff(n, pending_retry_after.take());
                tracing::debug!(attempt = n, ?sleep_duration, "retrying after backoff");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(sleep_duration) => {}
                }
            }

            let result = self.run_once(attempt, cancel).await;
            let is_last_attempt = n == RETRY_COUNT;

            match &result {
                Ok(response) => {
                    if !is_retriable_status(response.status().as_u16()) || is_last_attempt {
                        return result;
                    }
                    pending_retry_after = parse_retry_after(response);
                }
                Err(Error::Timeout(_)) | Err(Error::Transport(_)) => {
                    if is_last_attempt {
                        return result;
                    }
                }
                Err(_) => return result,
            }
        }

        unreachable!("loop always returns on its last iteration")
    }

    async fn run_once<F>(&self, attempt: &F, cancel: &CancellationToken) -> Result<Response>
    where
        F: Fn() -> BoxFuture<'static, reqwest::Result<Response>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(self.timeout, attempt()) => {
                match outcome {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(transport_err)) => Err(Error::Transport(Arc::new(transport_err))),
                    Err(_elapsed) => Err(Error::Timeout(self.timeout)),
                }
            }
        }
    }
}

/// Before the n-th retry (n = 1..=5), samples `clientWait_ms` uniformly from
/// `[BASE_DELAY_MS, 2^n * MULTIPLIER_MS)` and adds the server's `Retry-After` hint, if any.
///
/// The lower bound is constant while the upper bound grows exponentially, so this is a
/// full-range jitter window rather than a pure exponential backoff; the invariant
/// `lower < upper` only holds for `n >= 1` (2^1 * 1000 = 2000 > 500), which is the only range
/// this function is ever called with.
fn backoff(n: u32, retry_after: Option<Duration>) -> Duration {
    let upper = 2u64.saturating_pow(n) * MULTIPLIER_MS;
    let client_wait_ms = rand::thread_rng().gen_range(BASE_DELAY_MS..upper);
    let client_wait = Duration::from_millis(client_wait_ms);
    match retry_after {
        Some(ra) => ra + client_wait,
        None => client_wait,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::FutureExt;

    use super::*;

    fn response(status: u16) -> BoxFuture<'static, reqwest::Result<Response>> {
        let response: http::Response<String> = http::Response::builder()
            .status(status)
            .body(String::new())
            .unwrap();
        async move { Ok(Response::from(response)) }.boxed()
    }

    #[test]
    fn backoff_window_grows_exponentially_with_constant_floor() {
        for n in 1..=5u32 {
            let upper = 2u64.pow(n) * MULTIPLIER_MS;
            for _ in 0..20 {
                let d = backoff(n, None);
                assert!(d.as_millis() as u64 >= BASE_DELAY_MS);
                assert!(d.as_millis() as u64 < upper);
            }
        }
    }

    #[test]
    fn backoff_adds_retry_after_hint() {
        let d = backoff(1, Some(Duration::from_secs(2)));
        assert!(d >= Duration::from_secs(2) + Duration::from_millis(BASE_DELAY_MS));
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_2xx() {
        let policy = ResiliencyPolicy::new(Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = policy
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    response(200)
                },
                &cancel,
            )
            .await;

        assert!(result.unwrap().status().is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_bare_500() {
        let policy = ResiliencyPolicy::new(Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = policy
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    response(500)
                },
                &cancel,
            )
            .await;

        assert_eq!(result.unwrap().status().as_u16(), 500);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "500 is not retriable");
    }

    #[tokio::test]
    async fn gives_up_after_six_total_attempts() {
        let policy = ResiliencyPolicy::new(Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = policy
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    response(503)
                },
                &cancel,
            )
            .await;

        assert_eq!(result.unwrap().status().as_u16(), 503);
        assert_eq!(calls.load(Ordering::SeqCst), 6, "1 initial + 5 retries");
    }

    #[tokio::test]
    async fn breaker_opens_after_three_failing_calls_and_short_circuits_the_fourth() {
        let policy = ResiliencyPolicy::new(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let calls = AtomicU32::new(0);
            let result = policy
                .execute(
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        response(500)
                    },
                    &cancel,
                )
                .await;
            assert_eq!(result.unwrap().status().as_u16(), 500);
        }

        let calls = AtomicU32::new(0);
        let result = policy
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    response(200)
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no network I/O once open");
    }
}
