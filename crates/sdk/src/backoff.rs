//! Flush retry policy: exponential backoff with full jitter (§4.D-E).

use std::time::Duration;

use rand::Rng;

/// Controls how the flusher waits between retries of an undelivered batch.
#[derive(Debug, Clone)]
pub struct FlushBackoff {
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (cap).
    pub max_delay: Duration,
    /// Multiplier applied after each failed attempt.
    pub backoff_factor: f64,
    /// Consecutive failures after which the batch is dropped.
    pub max_attempts: u32,
}

impl Default for FlushBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            max_attempts: 10,
        }
    }
}

impl FlushBackoff {
    /// Compute a fully-jittered delay for the given attempt number
    /// (0-indexed): uniformly random in `[0, capped_delay]`, not just a
    /// fraction of it, so many clients backing off together don't still
    /// land in a thundering-herd band.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        let jittered_ms = rand::thread_rng().gen_range(0.0..=capped_ms);
        Duration::from_millis(jittered_ms as u64)
    }

    /// Whether `attempt` consecutive failures means the batch should be
    /// dropped (§4.E: "After 10 consecutive failures, drop the batch").
    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_match_spec() {
        let p = FlushBackoff::default();
        assert_eq!(p.initial_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(30));
        assert_eq!(p.max_attempts, 10);
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let p = FlushBackoff::default();
        for attempt in 0..20 {
            assert!(p.delay_for_attempt(attempt) <= Duration::from_secs(30));
        }
    }

    #[test]
    fn gives_up_after_ten_consecutive_failures() {
        let p = FlushBackoff::default();
        assert!(!p.should_give_up(9));
        assert!(p.should_give_up(10));
    }
}
