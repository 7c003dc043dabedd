//! Exponential backoff implementation

use std::{iter::Iterator, time::Duration};

/// Exponential backoff iterator
///
/// Yields monotonically increasing delays until `limit` retries have been handed out.
/// Each delay is the previous one multiplied by `multiplier`, starting at `initial`.
/// Delays saturate at [`Duration::MAX`] instead of overflowing.
/// Cloning a backoff yields an independent iterator in its current state, which makes
/// a fresh instance usable as a template for repeated retry cycles.
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    limit: u32,
    multiplier: u32,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), 2, 8)
    }
}

impl Backoff {
    /// Creates a new backoff which starts at the `initial` delay and gives up after `limit` retries
    pub fn new(initial: Duration, multiplier: u32, limit: u32) -> Self {
        Self {
            retries: 0,
            limit,
            multiplier,
            current: initial,
        }
    }

    /// Number of delays handed out so far
    pub fn retries(&self) -> u32 {
        self.retries.min(self.limit)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.retries >= self.limit {
            return None;
        }

        let delay = self.current;
        self.retries += 1;

        if self.retries < self.limit {
            self.current = self.current.saturating_mul(self.multiplier);
        }

        Some(delay)
    }
}
