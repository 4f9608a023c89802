//! Generic fixed-delay retry primitive.
//!
//! Extracted so teardown (and any future flaky external call) shares one
//! retry implementation instead of inlining sleep/loop logic.

use std::time::Duration;

/// How many times to try and how long to sleep between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Some host filesystems hold a brief lock on recently-written files,
        // so removal can take several seconds to become possible.
        Self {
            max_attempts: 15,
            delay: Duration::from_millis(2500),
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping `policy.delay`
/// between attempts. Returns the first `Ok`, or the last `Err` once the
/// budget is exhausted. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    // attempts >= 1, so last_err is always populated here
    Err(last_err.expect("retry ran at least one attempt"))
}
