//! Adaptive baseline of expected entropy under normal traffic.
//!
//! Entropy drifts with time-of-day traffic patterns, so a threshold fixed
//! at startup would produce chronic false positives and negatives. The
//! tracker instead keeps an exponentially weighted mean and variance that
//! follow slow drift at O(1) cost per window with no stored history.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::entropy::EntropyReading;

/// Snapshot of the baseline: running center and spread of entropy plus the
/// number of windows folded in so far.
///
/// Serializable verbatim, so an external collaborator can persist it across
/// process restarts and hand it back via [`BaselineTracker::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    /// Exponentially weighted mean entropy, in bits
    pub center: f64,
    /// Exponentially weighted variance, in bits squared
    pub variance: f64,
    /// Closed windows folded into the estimate
    pub windows_observed: u64,
}

impl BaselineState {
    /// Spread (standard deviation) of the baseline, in bits.
    pub fn spread(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Running estimate of normal entropy, updated once per closed window.
///
/// `update` is all-or-nothing: the next state is computed in full before it
/// replaces the previous one, so no failure path can leave the baseline
/// partially written.
pub struct BaselineTracker {
    alpha: f64,
    warmup_windows: u32,
    state: BaselineState,
}

impl BaselineTracker {
    pub fn new(alpha: f64, warmup_windows: u32) -> Self {
        Self {
            alpha,
            warmup_windows,
            state: BaselineState {
                center: 0.0,
                variance: 0.0,
                windows_observed: 0,
            },
        }
    }

    /// Rebuild a tracker from a previously persisted snapshot.
    pub fn restore(alpha: f64, warmup_windows: u32, state: BaselineState) -> Self {
        Self {
            alpha,
            warmup_windows,
            state,
        }
    }

    /// Fold one window's entropy into the running center and spread.
    pub fn update(&mut self, reading: &EntropyReading) {
        let x = reading.entropy;
        let next = if self.state.windows_observed == 0 {
            BaselineState {
                center: x,
                variance: 0.0,
                windows_observed: 1,
            }
        } else {
            let diff = x - self.state.center;
            let incr = self.alpha * diff;
            BaselineState {
                center: self.state.center + incr,
                variance: (1.0 - self.alpha) * (self.state.variance + diff * incr),
                windows_observed: self.state.windows_observed + 1,
            }
        };
        self.state = next;
        debug!(
            "baseline folded entropy {:.3}: center {:.3} spread {:.3} over {} windows",
            x,
            self.state.center,
            self.state.spread(),
            self.state.windows_observed
        );
    }

    /// Whether enough windows have been observed for the center to be
    /// meaningful. Until this is true the detector must classify every
    /// window Normal.
    pub fn is_ready(&self) -> bool {
        self.state.windows_observed >= u64::from(self.warmup_windows)
    }

    /// Immutable copy of the current state, for inclusion in events.
    pub fn snapshot(&self) -> BaselineState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(entropy: f64) -> EntropyReading {
        EntropyReading {
            entropy,
            total: 100,
            distinct: 10,
        }
    }

    #[test]
    fn not_ready_until_warmup_completes() {
        let mut tracker = BaselineTracker::new(0.2, 5);
        for i in 0..4 {
            assert!(!tracker.is_ready(), "ready after only {} windows", i);
            tracker.update(&reading(3.0));
        }
        assert!(!tracker.is_ready());
        tracker.update(&reading(3.0));
        assert!(tracker.is_ready());
    }

    #[test]
    fn constant_input_converges_to_that_value() {
        let mut tracker = BaselineTracker::new(0.3, 1);
        for _ in 0..50 {
            tracker.update(&reading(4.25));
        }
        let state = tracker.snapshot();
        assert!((state.center - 4.25).abs() < 1e-9);
        assert!(state.variance < 1e-9);
    }

    #[test]
    fn center_follows_a_level_shift() {
        let mut tracker = BaselineTracker::new(0.2, 1);
        for _ in 0..30 {
            tracker.update(&reading(3.0));
        }
        for _ in 0..30 {
            tracker.update(&reading(5.0));
        }
        let state = tracker.snapshot();
        assert!(state.center > 4.9, "center {} lags the shift", state.center);
        assert!(state.center <= 5.0 + 1e-9);
    }

    #[test]
    fn variance_stays_non_negative_under_noise() {
        let mut tracker = BaselineTracker::new(0.4, 1);
        for i in 0..100 {
            let wobble = if i % 2 == 0 { 0.25 } else { -0.25 };
            tracker.update(&reading(3.0 + wobble));
        }
        assert!(tracker.snapshot().variance >= 0.0);
        assert!(tracker.snapshot().spread() > 0.0);
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let mut tracker = BaselineTracker::new(0.2, 1);
        tracker.update(&reading(3.0));
        let before = tracker.snapshot();
        tracker.update(&reading(9.0));
        assert!((before.center - 3.0).abs() < 1e-9);
        assert!(tracker.snapshot().center > before.center);
    }

    #[test]
    fn restore_resumes_from_persisted_state() {
        let state = BaselineState {
            center: 3.5,
            variance: 0.04,
            windows_observed: 40,
        };
        let tracker = BaselineTracker::restore(0.1, 30, state);
        assert!(tracker.is_ready());
        assert_eq!(tracker.snapshot(), state);
    }
}
