//! Sliding-window outcome statistics for a single provider
//!
//! Every completed call attempt records an outcome here; routing policies
//! read the derived rates back out. The window is a bounded FIFO ring, so
//! all derived values reflect the most recent `window` attempts only.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A single completed call attempt.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    /// Attempt latency in milliseconds
    pub latency_ms: u64,
    /// Whether the attempt failed (timeouts included)
    pub error: bool,
    /// Monotonic completion time
    pub at: Instant,
}

/// Thread-safe ring of the most recent outcomes for one provider.
#[derive(Debug)]
pub struct OutcomeStats {
    window: usize,
    outcomes: RwLock<VecDeque<Outcome>>,
}

impl OutcomeStats {
    /// Create a stats window holding up to `window` outcomes.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            outcomes: RwLock::new(VecDeque::with_capacity(window)),
        }
    }

    /// Append an outcome, evicting the oldest once the ring is full.
    pub fn record(&self, latency_ms: u64, error: bool) {
        let mut outcomes = self.outcomes.write();
        outcomes.push_back(Outcome {
            latency_ms,
            error,
            at: Instant::now(),
        });
        while outcomes.len() > self.window {
            outcomes.pop_front();
        }
    }

    /// Fraction of outcomes in the ring that failed; `0.0` when empty.
    pub fn error_rate(&self) -> f64 {
        let outcomes = self.outcomes.read();
        if outcomes.is_empty() {
            return 0.0;
        }
        let errors = outcomes.iter().filter(|o| o.error).count();
        errors as f64 / outcomes.len() as f64
    }

    /// Error rate restricted to outcomes newer than `age`; `0.0` when no
    /// outcome qualifies.
    pub fn error_rate_since(&self, age: Duration) -> f64 {
        let outcomes = self.outcomes.read();
        let mut total = 0usize;
        let mut errors = 0usize;
        for o in outcomes.iter() {
            if o.at.elapsed() < age {
                total += 1;
                if o.error {
                    errors += 1;
                }
            }
        }
        if total == 0 {
            return 0.0;
        }
        errors as f64 / total as f64
    }

    /// 95th-percentile latency over successful outcomes only.
    ///
    /// Contract: sort ascending, index `ceil(0.95 * N) - 1` clamped into
    /// `[0, N - 1]`. For small N this picks the maximum. Returns `0` when
    /// there are no successful outcomes.
    pub fn p95_latency_ms(&self) -> u64 {
        let outcomes = self.outcomes.read();
        let mut latencies: Vec<u64> = outcomes
            .iter()
            .filter(|o| !o.error)
            .map(|o| o.latency_ms)
            .collect();
        if latencies.is_empty() {
            return 0;
        }
        latencies.sort_unstable();
        let idx = ((0.95 * latencies.len() as f64).ceil() as usize)
            .saturating_sub(1)
            .min(latencies.len() - 1);
        latencies[idx]
    }

    /// Number of outcomes currently held.
    pub fn len(&self) -> usize {
        self.outcomes.read().len()
    }

    /// True when no outcome has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.outcomes.read().is_empty()
    }
}
