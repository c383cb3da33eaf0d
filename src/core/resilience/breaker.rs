//! Per-provider circuit breaker
//!
//! A sliding-window error-ratio breaker. The window holds the error flags
//! of the most recent attempts; when it is full and more than half of them
//! failed, the breaker opens. After the cooldown a single half-open probe
//! is admitted: its success closes the breaker and clears the window, its
//! failure re-opens and restarts the cooldown.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker state as observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls are denied until the cooldown elapses
    Open,
    /// One probe is in flight
    HalfOpen,
    /// Calls pass through
    Closed,
}

impl BreakerState {
    /// Numeric gauge value: open=0, half_open=1, closed=2.
    pub fn as_f64(self) -> f64 {
        match self {
            BreakerState::Open => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Closed => 2.0,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    window: VecDeque<bool>,
    open: bool,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Sliding-window error-ratio circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    window_size: usize,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker with an empty window.
    pub fn new(name: impl Into<String>, window_size: usize, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            window_size,
            cooldown,
            inner: Mutex::new(BreakerInner {
                window: VecDeque::with_capacity(window_size),
                open: false,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Gate a call attempt. Must be called before every attempt.
    ///
    /// Closed: always true. Open before the cooldown: false. Open after
    /// the cooldown: true exactly once, promoting to half-open until the
    /// probe reports back through [`CircuitBreaker::on_result`].
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open {
            return true;
        }
        let cooled_down = inner
            .opened_at
            .map(|at| at.elapsed() >= self.cooldown)
            .unwrap_or(true);
        if cooled_down && !inner.probe_in_flight {
            inner.probe_in_flight = true;
            return true;
        }
        false
    }

    /// Record the result of a completed attempt. Must be called after
    /// every attempt that was admitted by [`CircuitBreaker::allow`].
    pub fn on_result(&self, error: bool) {
        let mut inner = self.inner.lock();
        inner.window.push_back(error);
        while inner.window.len() > self.window_size {
            inner.window.pop_front();
        }

        if inner.probe_in_flight {
            inner.probe_in_flight = false;
            if error {
                inner.open = true;
                inner.opened_at = Some(Instant::now());
                warn!(provider = %self.name, "circuit breaker re-opened after failed probe");
            } else {
                inner.open = false;
                inner.opened_at = None;
                inner.window.clear();
                info!(provider = %self.name, "circuit breaker closed after successful probe");
            }
            return;
        }

        if inner.window.len() >= self.window_size && !inner.open {
            let errors = inner.window.iter().filter(|e| **e).count();
            if errors as f64 / inner.window.len() as f64 > 0.5 {
                inner.open = true;
                inner.opened_at = Some(Instant::now());
                warn!(
                    provider = %self.name,
                    error_ratio = errors as f64 / inner.window.len() as f64,
                    "circuit breaker opened"
                );
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock();
        if inner.open {
            if inner.probe_in_flight {
                BreakerState::HalfOpen
            } else {
                BreakerState::Open
            }
        } else {
            BreakerState::Closed
        }
    }

    /// Numeric gauge value for the current state.
    pub fn state_value(&self) -> f64 {
        self.state().as_f64()
    }
}
