//! Retry with exponential back-off and jitter for model calls.

use std::future::Future;
use std::time::Duration;

use crate::error::AnalyzerError;

const MAX_DELAY_MS: u64 = 60_000;

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors (see [`AnalyzerError::is_retriable`]).
///
/// Attempt `n` sleeps `backoff_base_ms × 2ⁿ⁻¹ ± 25 %` before retrying, capped
/// at 60 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalyzerError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient model error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    let capped = capped_delay_ms(backoff_base_ms, attempt);
    (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64
}

fn capped_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    backoff_base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS)
}

/// Longest total sleep [`retry_with_backoff`] can spend across `max_retries`.
pub(crate) fn max_total_backoff_ms(max_retries: u32, backoff_base_ms: u64) -> u64 {
    (1..=max_retries)
        .map(|attempt| capped_delay_ms(backoff_base_ms, attempt).saturating_mul(5) / 4)
        .fold(0u64, u64::saturating_add)
}
