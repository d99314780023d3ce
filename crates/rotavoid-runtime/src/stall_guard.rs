//! [`StallGuard`] – lack-of-progress detector for the simulation driver.
//!
//! Modulated dynamics can, in unlucky scenes, trap the agent in a local
//! minimum or a tight oscillation. The guard watches the progress made per
//! step and flags a stall before the driver burns its whole step budget.
//!
//! # Algorithm
//!
//! The guard keeps a rolling window of the last *N* progress values. After
//! each [`StallGuard::record`] call it checks whether the most recent
//! `threshold` entries are all below `min_progress`. If they are,
//! [`record`](StallGuard::record) returns `true`.
//!
//! # Example
//!
//! ```rust
//! use rotavoid_runtime::stall_guard::StallGuard;
//!
//! let mut guard = StallGuard::new(3, 1e-6);
//!
//! assert!(!guard.record(0.0));
//! assert!(!guard.record(1e-9));
//! assert!(guard.record(-1e-3)); // third step without progress → stalled
//!
//! // Any real progress breaks the streak.
//! assert!(!guard.record(0.1));
//! ```

use std::collections::VecDeque;

// ─────────────────────────────────────────────────────────────────────────────
// StallGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Detects when an integrated trajectory stops making progress.
pub struct StallGuard {
    /// Number of consecutive stalled steps that triggers detection.
    threshold: usize,
    /// Progress below this value counts as stalled.
    min_progress: f64,
    /// Rolling window of the most recent progress values.
    history: VecDeque<f64>,
}

impl StallGuard {
    /// Create a new guard.
    ///
    /// A `threshold` of 0 is treated as 1.
    pub fn new(threshold: usize, min_progress: f64) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            min_progress,
            history: VecDeque::with_capacity(threshold),
        }
    }

    /// Record the progress of the step just taken.
    ///
    /// Returns `true` once `threshold` consecutive steps fell below
    /// `min_progress`.
    pub fn record(&mut self, progress: f64) -> bool {
        self.history.push_back(progress);
        while self.history.len() > self.threshold {
            self.history.pop_front();
        }
        self.is_stalled()
    }

    /// `true` when the window is full and every entry is below
    /// `min_progress`. NaN progress counts as stalled.
    pub fn is_stalled(&self) -> bool {
        if self.history.len() < self.threshold {
            return false;
        }
        self.history.iter().all(|p| !(*p >= self.min_progress))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Clear all recorded history.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_progress_never_stalls() {
        let mut guard = StallGuard::new(3, 1e-6);
        for _ in 0..10 {
            assert!(!guard.record(0.01));
        }
    }

    #[test]
    fn detects_stall_at_threshold() {
        let mut guard = StallGuard::new(3, 1e-6);
        assert!(!guard.record(0.0));
        assert!(!guard.record(0.0));
        assert!(guard.record(0.0));
        assert!(guard.record(0.0)); // still stalled
    }

    #[test]
    fn progress_breaks_the_streak() {
        let mut guard = StallGuard::new(3, 1e-6);
        guard.record(0.0);
        guard.record(0.0);
        guard.record(0.5);
        assert!(!guard.is_stalled());
    }

    #[test]
    fn moving_away_counts_as_stalled() {
        let mut guard = StallGuard::new(2, 0.0);
        guard.record(-0.2);
        assert!(guard.record(-0.1));
    }

    #[test]
    fn retreat_shorter_than_the_window_is_tolerated() {
        let mut guard = StallGuard::new(5, 1e-9);
        for _ in 0..4 {
            assert!(!guard.record(-0.01));
        }
        assert!(!guard.record(0.02));
        for _ in 0..4 {
            assert!(!guard.record(-0.01));
        }
        // A retreat as long as the window is a stall.
        assert!(guard.record(-0.01));
    }

    #[test]
    fn nan_counts_as_stalled() {
        let mut guard = StallGuard::new(1, 0.0);
        assert!(guard.record(f64::NAN));
    }

    #[test]
    fn reset_clears_history() {
        let mut guard = StallGuard::new(2, 1e-6);
        guard.record(0.0);
        assert!(guard.record(0.0));
        guard.reset();
        assert!(!guard.record(0.0));
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let mut guard = StallGuard::new(0, 1e-6);
        assert_eq!(guard.threshold(), 1);
        assert!(guard.record(0.0));
    }
}
