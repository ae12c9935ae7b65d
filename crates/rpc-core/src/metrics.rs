//! Component D: count-based sliding-window outcome counters, and a latency
//! ring buffer with percentile computation (spec §3 "Sliding window" /
//! "Latency window", §4.4 "Metrics trimming").

use std::sync::Mutex;

/// Outcome counters for one breaker's sliding window.
///
/// The window is count-based, not time-based: when `total` exceeds
/// `window_size` the counters are scaled down proportionally so that
/// `total == window_size` while the failure/slow rates are preserved.
#[derive(Debug)]
pub struct SlidingWindow {
    window_size: u64,
    state: Mutex<WindowState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct WindowState {
    total: u64,
    failed: u64,
    slow: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowSnapshot {
    pub total: u64,
    pub failed: u64,
    pub slow: u64,
}

impl WindowSnapshot {
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.failed as f64 / self.total as f64 * 100.0 }
    }

    pub fn slow_call_rate(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.slow as f64 / self.total as f64 * 100.0 }
    }
}

impl SlidingWindow {
    pub fn new(window_size: u64) -> Self {
        Self { window_size: window_size.max(1), state: Mutex::new(WindowState::default()) }
    }

    pub fn record_success(&self, slow: bool) {
        let mut s = self.state.lock().unwrap();
        s.total += 1;
        if slow {
            s.slow += 1;
        }
        Self::trim(&mut s, self.window_size);
    }

    pub fn record_failure(&self) {
        let mut s = self.state.lock().unwrap();
        s.total += 1;
        s.failed += 1;
        Self::trim(&mut s, self.window_size);
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let s = self.state.lock().unwrap();
        WindowSnapshot { total: s.total, failed: s.failed, slow: s.slow }
    }

    pub fn reset(&self) {
        let mut s = self.state.lock().unwrap();
        *s = WindowState::default();
    }

    fn trim(s: &mut WindowState, window_size: u64) {
        if s.total <= window_size {
            return;
        }
        let factor = window_size as f64 / s.total as f64;
        s.failed = ((s.failed as f64) * factor).round() as u64;
        s.slow = ((s.slow as f64) * factor).round() as u64;
        s.total = window_size;
        // Rounding can push failed+slow fractionally above total; clamp.
        if s.failed > s.total {
            s.failed = s.total;
        }
        if s.slow > s.total {
            s.slow = s.total;
        }
    }
}

/// Fixed-capacity ring buffer of recent latency samples (milliseconds),
/// with percentile computation guarded by a short lock (spec §4.5, §5).
#[derive(Debug)]
pub struct LatencyWindow {
    capacity: usize,
    state: Mutex<LatencyState>,
}

#[derive(Debug)]
struct LatencyState {
    samples: Vec<u64>,
    next: usize,
    recorded: u64,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(LatencyState { samples: Vec::with_capacity(capacity), next: 0, recorded: 0 }),
        }
    }

    pub fn record(&self, latency_ms: u64) {
        let mut s = self.state.lock().unwrap();
        if s.samples.len() < self.capacity {
            s.samples.push(latency_ms);
        } else {
            s.samples[s.next] = latency_ms;
        }
        s.next = (s.next + 1) % self.capacity;
        s.recorded += 1;
    }

    pub fn count(&self) -> usize {
        let s = self.state.lock().unwrap();
        s.samples.len().min(self.capacity)
    }

    pub fn reset(&self) {
        let mut s = self.state.lock().unwrap();
        s.samples.clear();
        s.next = 0;
        s.recorded = 0;
    }

    /// `percentile(0.99)` is P99, etc. Copies the active prefix, sorts it,
    /// and indexes `ceil(p * n) - 1`, clamped into range.
    pub fn percentile(&self, p: f64) -> Option<u64> {
        let mut sorted = {
            let s = self.state.lock().unwrap();
            s.samples.clone()
        };
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_unstable();
        let n = sorted.len();
        let idx = ((p * n as f64).ceil() as i64 - 1).clamp(0, n as i64 - 1) as usize;
        Some(sorted[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_safe_below_minimum_calls() {
        let w = SlidingWindow::new(100);
        for _ in 0..4 {
            w.record_failure();
        }
        let snap = w.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.failure_rate(), 100.0);
    }

    #[test]
    fn trims_proportionally_past_window_size() {
        let w = SlidingWindow::new(10);
        for _ in 0..15 {
            w.record_failure();
        }
        let snap = w.snapshot();
        assert_eq!(snap.total, 10);
        assert_eq!(snap.failed, 10);
    }

    #[test]
    fn trim_preserves_rate_for_mixed_outcomes() {
        let w = SlidingWindow::new(10);
        for _ in 0..10 {
            w.record_failure();
        }
        for _ in 0..10 {
            w.record_success(false);
        }
        let snap = w.snapshot();
        assert_eq!(snap.total, 10);
        // 20 calls, 10 failed -> 50% preserved after scaling to 10.
        assert_eq!(snap.failed, 5);
    }

    #[test]
    fn p99_of_uniform_samples() {
        let lw = LatencyWindow::new(1000);
        for _ in 0..100 {
            lw.record(100);
        }
        assert_eq!(lw.percentile(0.99), Some(100));
    }

    #[test]
    fn ring_buffer_wraps() {
        let lw = LatencyWindow::new(3);
        for v in [1, 2, 3, 4, 5] {
            lw.record(v);
        }
        assert_eq!(lw.count(), 3);
        // Only the last 3 samples (3,4,5) remain.
        assert_eq!(lw.percentile(1.0), Some(5));
    }
}
