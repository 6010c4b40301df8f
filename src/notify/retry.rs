// src/notify/retry.rs
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use super::DeliveryError;

/// Bounded retry for one delivery.
///
/// - 429: wait the server's `Retry-After` (or `default_retry_after`), capped
///   at `max_retry_after`.
/// - transport errors and 5xx: exponential backoff from `base_backoff`.
/// - any other error: no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_retry_after: Duration,
    pub max_retry_after: Duration,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_retry_after: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(120),
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` to stop. `attempt` is the
    /// 1-based attempt that just failed.
    pub fn delay_after(&self, attempt: u32, err: &DeliveryError) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        match err {
            DeliveryError::RateLimited { retry_after } => Some(
                retry_after
                    .unwrap_or(self.default_retry_after)
                    .min(self.max_retry_after),
            ),
            DeliveryError::Transport(_) => Some(self.backoff(attempt)),
            e if e.is_server_error() => Some(self.backoff(attempt)),
            _ => None,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * (1u32 << (attempt - 1).min(16))
    }
}

/// Run `op` until it succeeds or the policy says stop.
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    channel: &str,
    mut op: F,
) -> Result<(), DeliveryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), DeliveryError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        match policy.delay_after(attempt, &err) {
            Some(delay) => {
                debug!(channel, attempt, ?delay, error = %err, "retrying delivery");
                counter!("delivery_retries_total", "channel" => channel.to_string()).increment(1);
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(channel, attempt, error = %err, "giving up on delivery");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn scripted(
        script: Vec<Result<(), DeliveryError>>,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<(), DeliveryError>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut script = script.into_iter();
        let op = move || {
            c.fetch_add(1, Ordering::SeqCst);
            std::future::ready(script.next().unwrap_or(Ok(())))
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn honors_retry_after() {
        let (calls, op) = scripted(vec![Err(DeliveryError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        })]);
        let start = Instant::now();
        send_with_retry(&RetryPolicy::default(), "t", op).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert!(start.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_without_hint_uses_default_and_cap() {
        let policy = RetryPolicy::default();
        let none = DeliveryError::RateLimited { retry_after: None };
        assert_eq!(policy.delay_after(1, &none), Some(Duration::from_secs(5)));
        let huge = DeliveryError::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(policy.delay_after(1, &huge), Some(Duration::from_secs(120)));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_back_off_then_give_up() {
        let (calls, op) = scripted(vec![
            Err(DeliveryError::Transport("reset".into())),
            Err(DeliveryError::Transport("reset".into())),
            Err(DeliveryError::Transport("reset".into())),
        ]);
        let start = Instant::now();
        let err = send_with_retry(&RetryPolicy::default(), "t", op)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let (calls, op) = scripted(vec![Err(DeliveryError::Status {
            status: 400,
            body: "chat not found".into(),
        })]);
        assert!(send_with_retry(&RetryPolicy::default(), "t", op).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn server_errors_are_retried() {
        let p = RetryPolicy::default();
        let e = DeliveryError::Status {
            status: 503,
            body: String::new(),
        };
        assert_eq!(p.delay_after(1, &e), Some(Duration::from_millis(500)));
        assert_eq!(p.delay_after(2, &e), Some(Duration::from_millis(1000)));
        assert_eq!(p.delay_after(3, &e), None);
    }
}
