//! Component H: smart retry backoff math (spec §4.8). Classification of
//! which errors are retryable lives on [`crate::error::RpcError::is_retryable`];
//! this module only computes delays.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2.0,
            jitter_factor: 0.5,
            retry_on_timeout: true,
        }
    }
}

/// Which jitter scheme `calculate_delay` applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// `d ± d * jitterFactor * Uniform[-1, +1)`, the pipeline's default.
    Standard,
    /// `Uniform[0, min(maxDelay, baseDelay * multiplier^attempt))`.
    Full,
    /// `Uniform[baseDelay, min(maxDelay, 3 * previousDelay))`.
    Decorrelated,
}

impl RetryConfig {
    /// `calculateDelay(attempt)` for the standard jitter scheme (spec §4.8).
    /// `attempt` is 0-based (the delay before the *second* attempt is
    /// `calculate_delay(0)`).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.calculate_delay_with(attempt, JitterStrategy::Standard, Duration::ZERO)
    }

    pub fn calculate_delay_with(
        &self,
        attempt: u32,
        strategy: JitterStrategy,
        previous_delay: Duration,
    ) -> Duration {
        let base_ms = self.base_delay.as_secs_f64() * 1000.0;
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;
        let raw = base_ms * self.multiplier.powi(attempt as i32);
        let capped = raw.min(max_ms);

        let mut rng = rand::thread_rng();
        let delay_ms = match strategy {
            JitterStrategy::Standard => {
                let jitter = capped * self.jitter_factor * rng.gen_range(-1.0..1.0);
                (capped + jitter).max(0.0).round()
            }
            JitterStrategy::Full => rng.gen_range(0.0..capped.max(f64::MIN_POSITIVE)).round(),
            JitterStrategy::Decorrelated => {
                let prev_ms = previous_delay.as_secs_f64() * 1000.0;
                let upper = (3.0 * prev_ms.max(base_ms)).min(max_ms).max(base_ms);
                rng.gen_range(base_ms..upper.max(base_ms + 1.0)).round()
            }
        };

        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_jitter_matches_the_literal_scenario() {
        let cfg = RetryConfig {
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            jitter_factor: 0.0,
            ..Default::default()
        };
        let delays: Vec<u64> = (0..5).map(|a| cfg.calculate_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn standard_jitter_stays_non_negative_and_bounded() {
        let cfg = RetryConfig::default();
        for attempt in 0..6 {
            let d = cfg.calculate_delay(attempt);
            assert!(d <= cfg.max_delay + cfg.max_delay.mul_f64(cfg.jitter_factor));
        }
    }

    #[test]
    fn full_jitter_never_exceeds_the_cap() {
        let cfg = RetryConfig { max_delay: Duration::from_millis(500), ..Default::default() };
        for attempt in 0..6 {
            let d = cfg.calculate_delay_with(attempt, JitterStrategy::Full, Duration::ZERO);
            assert!(d <= cfg.max_delay);
        }
    }

    #[test]
    fn decorrelated_jitter_is_at_least_base_delay() {
        let cfg = RetryConfig::default();
        let d = cfg.calculate_delay_with(2, JitterStrategy::Decorrelated, Duration::from_millis(300));
        assert!(d >= cfg.base_delay);
    }
}
