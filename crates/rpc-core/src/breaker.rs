//! Component E: per-endpoint circuit breaker (spec §4.4).

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::info;

use crate::metrics::SlidingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::HalfOpen,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_threshold: Duration,
    pub wait_duration_in_open_state: Duration,
    pub sliding_window_size: u64,
    pub minimum_number_of_calls: u64,
    pub permitted_calls_in_half_open: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_threshold: Duration::from_millis(3000),
            wait_duration_in_open_state: Duration::from_millis(30_000),
            sliding_window_size: 100,
            minimum_number_of_calls: 10,
            permitted_calls_in_half_open: 5,
        }
    }
}

/// Three-state machine admitting or rejecting calls to one endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: AtomicU8,
    last_transition: Mutex<Instant>,
    half_open_call_count: AtomicU32,
    metrics: SlidingWindow,
    key: String,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            metrics: SlidingWindow::new(config.sliding_window_size),
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            last_transition: Mutex::new(Instant::now()),
            half_open_call_count: AtomicU32::new(0),
            key: key.into(),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Admission decision (spec §4.4 "Admission rules").
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.last_transition.lock().unwrap().elapsed();
                if elapsed >= self.config.wait_duration_in_open_state {
                    self.transition_to(CircuitState::HalfOpen);
                    self.half_open_call_count.store(0, Ordering::SeqCst);
                    // First probe after the transition.
                    self.half_open_call_count.fetch_add(1, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let taken = self.half_open_call_count.fetch_add(1, Ordering::SeqCst) + 1;
                taken <= self.config.permitted_calls_in_half_open
            }
        }
    }

    /// Record a successful call; `duration` marks it slow if it exceeds the
    /// configured threshold.
    pub fn record_success(&self, duration: Duration) {
        let slow = duration >= self.config.slow_call_duration_threshold;
        self.metrics.record_success(slow);

        if self.state() == CircuitState::HalfOpen {
            let probes_taken = self.half_open_call_count.load(Ordering::SeqCst);
            if probes_taken >= self.config.permitted_calls_in_half_open {
                let snap = self.metrics.snapshot();
                if snap.failure_rate() < self.config.failure_rate_threshold {
                    self.metrics.reset();
                    self.transition_to(CircuitState::Closed);
                }
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        self.metrics.record_failure();

        match self.state() {
            CircuitState::Closed => {
                let snap = self.metrics.snapshot();
                if snap.total >= self.config.minimum_number_of_calls
                    && (snap.failure_rate() >= self.config.failure_rate_threshold
                        || snap.slow_call_rate() >= self.config.slow_call_rate_threshold)
                {
                    self.transition_to(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Test/ops hook: force a state, resetting metrics when forced to `Closed`.
    pub fn force_state(&self, state: CircuitState) {
        if state == CircuitState::Closed {
            self.metrics.reset();
        }
        if state == CircuitState::HalfOpen {
            self.half_open_call_count.store(0, Ordering::SeqCst);
        }
        self.transition_to(state);
    }

    pub fn snapshot(&self) -> crate::metrics::WindowSnapshot {
        self.metrics.snapshot()
    }

    fn transition_to(&self, new_state: CircuitState) {
        let old = self.state.swap(new_state as u8, Ordering::AcqRel);
        if old != new_state as u8 {
            *self.last_transition.lock().unwrap() = Instant::now();
            info!(key = %self.key, from = ?CircuitState::from_u8(old), to = ?new_state, "breaker state transition");
        }
    }
}

/// Process-wide registry: breakers are created on first use per endpoint key
/// and live for the process lifetime (spec §3, §4.4 "Registry").
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, std::sync::Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    pub fn get_or_create(&self, endpoint_key: &str) -> std::sync::Arc<CircuitBreaker> {
        self.breakers
            .entry(endpoint_key.to_owned())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(endpoint_key, self.config)))
            .clone()
    }

    /// Test-only hook: drop a breaker so the next `get_or_create` rebuilds it.
    pub fn remove(&self, endpoint_key: &str) {
        self.breakers.remove(endpoint_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_rate_threshold: 50.0,
            minimum_number_of_calls: 5,
            wait_duration_in_open_state: Duration::from_millis(100),
            sliding_window_size: 10,
            permitted_calls_in_half_open: 5,
            ..Default::default()
        }
    }

    #[test]
    fn never_trips_below_minimum_calls() {
        let b = CircuitBreaker::new("svc@h:1", fast_config());
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow_request());
    }

    #[test]
    fn opens_after_enough_failures_then_half_opens_after_cooldown() {
        let b = CircuitBreaker::new("svc@h:1", fast_config());
        for _ in 0..5 {
            b.record_failure();
        }
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.allow_request());

        std::thread::sleep(Duration::from_millis(150));
        assert!(b.allow_request());
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn rejects_every_request_while_open_and_cooling_down() {
        let b = CircuitBreaker::new("svc@h:1", fast_config());
        for _ in 0..5 {
            b.record_failure();
        }
        assert_eq!(b.state(), CircuitState::Open);
        for _ in 0..3 {
            assert!(!b.allow_request());
        }
    }

    #[test]
    fn half_open_failure_reopens_unconditionally() {
        let b = CircuitBreaker::new("svc@h:1", fast_config());
        for _ in 0..5 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(150));
        assert!(b.allow_request());
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_closes_after_enough_good_probes() {
        let cfg = BreakerConfig { permitted_calls_in_half_open: 3, ..fast_config() };
        let b = CircuitBreaker::new("svc@h:1", cfg);
        for _ in 0..5 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(150));
        for _ in 0..3 {
            assert!(b.allow_request());
            b.record_success(Duration::from_millis(1));
        }
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
