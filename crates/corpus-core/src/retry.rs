//! Shared retry-with-backoff for the three external dependencies the spec
//! calls out as suspension points (§5): the Graph Repository, the Embedding
//! Provider, and the LLM. Every read is idempotent and may be retried on
//! transient transport failure with exponential backoff capped at a small
//! number of attempts (spec §4.1, §5).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry `op` up to `max_attempts` times with exponential backoff starting
/// at `base`. `is_transient` classifies whether a given error is worth
/// retrying at all — retries are applied only to transient-classified
/// failures (spec §5).
pub async fn retry_idempotent<T, E, F, Fut>(
    max_attempts: u32,
    base: Duration,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_transient(&err) => {
                let delay = base * 2u32.pow(attempt - 1);
                warn!(attempt, %err, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
