//! Canary traffic controller
//!
//! Tracks calls observed for the candidate provider and, at every window
//! boundary, either advances the traffic split one stage or rolls back to
//! the first stage when the candidate burns error budget faster than the
//! configured multiplier allows.

use crate::utils::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Default traffic percentages per stage.
pub const DEFAULT_CANARY_STAGES: [f64; 3] = [1.0, 5.0, 25.0];
/// Default number of candidate calls per evaluation window.
pub const DEFAULT_CANARY_WINDOW: u64 = 200;
/// Default burn-rate multiplier that triggers rollback.
pub const DEFAULT_BURN_MULTIPLIER: f64 = 2.0;

/// A recorded stage transition.
#[derive(Debug, Clone, Serialize)]
pub struct CanaryTransition {
    /// When the transition happened
    pub at: DateTime<Utc>,
    /// Machine-readable reason, e.g. `auto_advance` or
    /// `auto_rollback:burn=4.20`
    pub reason: String,
}

/// State machine deciding the canary traffic split.
#[derive(Debug)]
pub struct CanaryController {
    stages: Vec<f64>,
    stage_idx: usize,
    window: u64,
    burn_multiplier: f64,
    candidate: Option<String>,
    candidate_calls: u64,
    last_transition: Option<CanaryTransition>,
}

impl CanaryController {
    /// Create a controller with default stages. `candidate` is the name
    /// of the second-cheapest provider, or `None` when fewer than two
    /// providers are registered.
    pub fn new(candidate: Option<String>) -> Self {
        Self {
            stages: DEFAULT_CANARY_STAGES.to_vec(),
            stage_idx: 0,
            window: DEFAULT_CANARY_WINDOW,
            burn_multiplier: DEFAULT_BURN_MULTIPLIER,
            candidate,
            candidate_calls: 0,
            last_transition: None,
        }
    }

    /// Candidate provider name, if any.
    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    /// Current traffic percentage routed to the candidate. Exactly zero
    /// when there is no candidate.
    pub fn percent(&self) -> f64 {
        if self.candidate.is_none() {
            return 0.0;
        }
        self.stages[self.stage_idx]
    }

    /// Index of the current stage.
    pub fn stage_index(&self) -> usize {
        self.stage_idx
    }

    /// Evaluation window size in candidate calls.
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Burn multiplier guarding advances.
    pub fn burn_multiplier(&self) -> f64 {
        self.burn_multiplier
    }

    /// Most recent stage transition, if any.
    pub fn last_transition(&self) -> Option<&CanaryTransition> {
        self.last_transition.as_ref()
    }

    /// Observe a completed call. Only calls against the candidate count;
    /// at each positive multiple of the window size the candidate's burn
    /// rate (computed lazily via `candidate_burn`) decides between
    /// rollback and advance.
    pub fn record_result(&mut self, provider: &str, candidate_burn: impl FnOnce() -> f64) {
        if self.candidate.as_deref() != Some(provider) {
            return;
        }
        self.candidate_calls += 1;
        if self.candidate_calls % self.window != 0 {
            return;
        }

        let burn = candidate_burn();
        if burn > self.burn_multiplier {
            self.stage_idx = 0;
            self.transition(format!("auto_rollback:burn={burn:.2}"));
            warn!(
                candidate = provider,
                burn, "canary rolled back on error-budget burn"
            );
        } else if self.stage_idx + 1 < self.stages.len() {
            self.stage_idx += 1;
            self.transition("auto_advance".to_string());
            info!(
                candidate = provider,
                stage = self.stage_idx,
                percent = self.stages[self.stage_idx],
                "canary advanced"
            );
        }
    }

    /// Advance one stage. Without `force`, rejects with a guardrail error
    /// when the candidate's burn rate exceeds the multiplier; the state
    /// is left untouched on rejection.
    pub fn advance(&mut self, force: bool, candidate_burn: f64) -> Result<()> {
        if !force && candidate_burn > self.burn_multiplier {
            return Err(GatewayError::CanaryGuardrail {
                burn: candidate_burn,
            });
        }
        self.stage_idx = (self.stage_idx + 1).min(self.stages.len() - 1);
        self.transition(if force {
            "manual_advance:forced".to_string()
        } else {
            "manual_advance".to_string()
        });
        Ok(())
    }

    /// Reset to the first stage. Idempotent.
    pub fn rollback(&mut self) {
        self.stage_idx = 0;
        self.transition("manual_rollback".to_string());
    }

    /// Replace the configuration, clamping the stage index into range.
    /// Empty stage lists and nonpositive window/multiplier values leave
    /// the current value in place.
    pub fn configure(&mut self, stages: Vec<f64>, window: u64, burn_multiplier: f64) {
        if !stages.is_empty() {
            self.stages = stages;
        }
        self.stage_idx = self.stage_idx.min(self.stages.len() - 1);
        if window > 0 {
            self.window = window;
        }
        if burn_multiplier > 0.0 {
            self.burn_multiplier = burn_multiplier;
        }
    }

    fn transition(&mut self, reason: String) {
        self.last_transition = Some(CanaryTransition {
            at: Utc::now(),
            reason,
        });
    }
}
