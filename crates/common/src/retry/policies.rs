use super::Backoff;

/// Configuration for exponential retry backoff.
///
/// Delays grow by a fixed-point multiplier (`multiplier / multiplier_base`),
/// avoiding floating-point math, and never exceed `max_delay_ms`.
///
/// # Example
///
/// ```
/// use bifrost_common::retry::{policies::ExponentialBackoff, Backoff};
///
/// // Starts at 500ms and grows by 1.5x each retry, capped at 2s:
/// // 500ms → 750ms → 1125ms → 1687ms → 2000ms → ...
/// let backoff = ExponentialBackoff::new(500, 150, 100).with_max_delay_ms(2_000);
/// assert_eq!(backoff.next_delay_ms(1_687), 2_000);
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial delay before the first retry, in milliseconds.
    base_delay_ms: u64,

    /// Numerator of the backoff multiplier (e.g., `150` for 1.5x).
    multiplier: u64,

    /// Denominator of the backoff multiplier (e.g., `100` for 1.5x).
    multiplier_base: u64,

    /// Upper bound of a single delay.
    max_delay_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base_delay_ms: u64, multiplier: u64, multiplier_base: u64) -> Self {
        Self {
            base_delay_ms,
            multiplier,
            multiplier_base: multiplier_base.max(1),
            max_delay_ms: u64::MAX,
        }
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            multiplier: 15,
            multiplier_base: 10,
            max_delay_ms: 3 * 60 * 1_000,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms.min(self.max_delay_ms)
    }

    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64 {
        let next = curr_delay_ms.saturating_mul(self.multiplier) / self.multiplier_base;
        next.min(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_until_cap() {
        let backoff = ExponentialBackoff::new(1_000, 2, 1).with_max_delay_ms(5_000);

        let mut delays = vec![backoff.base_delay_ms()];
        for _ in 0..4 {
            let last = *delays.last().unwrap();
            delays.push(backoff.next_delay_ms(last));
        }

        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn test_zero_base_is_clamped() {
        let backoff = ExponentialBackoff::new(100, 3, 0);
        assert_eq!(backoff.next_delay_ms(100), 300);
    }
}
