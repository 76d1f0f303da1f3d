//! Retry delays for transient failures.

use crate::constants::MAX_BACKOFF_DELAY_MS;
use std::time::Duration;

/// Delay sequence `initial, 2*initial, 4*initial, ...`, capped at
/// [`MAX_BACKOFF_DELAY_MS`] and limited to `max_retries` items.
///
/// Used as the strategy for `tokio_retry::RetryIf`, which makes one attempt
/// per item plus the initial one.
///
/// ```rust
/// use prs_resolver::utils::DoublingBackoff;
/// use std::time::Duration;
///
/// let delays: Vec<_> = DoublingBackoff::new(Duration::from_millis(100), 3).collect();
/// assert_eq!(delays, vec![
///     Duration::from_millis(100),
///     Duration::from_millis(200),
///     Duration::from_millis(400),
/// ]);
/// ```
#[derive(Debug, Clone)]
pub struct DoublingBackoff {
    next: Duration,
    max: Duration,
    remaining: usize,
}

impl DoublingBackoff {
    #[must_use]
    pub const fn new(initial: Duration, max_retries: usize) -> Self {
        Self {
            next: initial,
            max: Duration::from_millis(MAX_BACKOFF_DELAY_MS),
            remaining: max_retries,
        }
    }
}

impl Iterator for DoublingBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next.min(self.max);
        self.next = self.next.saturating_mul(2);
        Some(current)
    }
}
