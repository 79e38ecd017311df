use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::QxError;

fn is_retryable(policy: &RetryPolicy, err: &QxError) -> bool {
    match err {
        QxError::Timeout { .. } => policy.retry_on_timeout,
        QxError::RateLimited { .. } => policy.retry_on_rate_limit,
        _ => false,
    }
}

/// One delay per allowed retry, as computed by the policy.
fn backoff(policy: &RetryPolicy) -> impl Iterator<Item = Duration> + '_ {
    (0..policy.max_attempts)
        .filter_map(|n| i32::try_from(n).ok())
        .filter_map(|n| policy.calculate_delay(n).ok())
}

/// Runs `op` once, then retries timeouts and rate limits as the policy allows,
/// up to `max_attempts` extra attempts with exponential backoff in between.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, QxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QxError>>,
{
    let attempts = Cell::new(0u32);
    let result = RetryIf::spawn(
        backoff(policy),
        || {
            attempts.set(attempts.get() + 1);
            op()
        },
        |err: &QxError| {
            let retry = is_retryable(policy, err);
            if retry && attempts.get() <= policy.max_attempts {
                debug!(
                    attempt = attempts.get(),
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "retrying OpenAI request"
                );
            }
            retry
        },
    )
    .await;

    match result {
        Err(err) if attempts.get() > 1 && is_retryable(policy, &err) => {
            warn!(attempts = attempts.get(), error = %err, "giving up after retries");
            Err(QxError::RetriesExhausted {
                attempts: attempts.get(),
                last_error: Box::new(err),
            })
        }
        other => other,
    }
}
