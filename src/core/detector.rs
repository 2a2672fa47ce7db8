//! Classification of entropy readings against the baseline.

use serde::{Deserialize, Serialize};

use crate::core::baseline::BaselineTracker;
use crate::core::entropy::EntropyReading;
use crate::models::ConfigurationError;

/// Floor for the baseline spread in the deviation quotient. Exists only to
/// avoid division by zero on a degenerate constant baseline, not as a
/// tuning knob.
const SPREAD_FLOOR: f64 = 1e-9;

/// Three-way classification of one closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    Suspicious,
    Anomalous,
}

/// Outcome of classifying one window: the class and the signed deviation
/// score it was derived from.
///
/// The deviation is positive when entropy dropped below the baseline
/// center and negative when it rose; rises classify Normal by policy but
/// the score is still recorded for observability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub classification: Classification,
    pub deviation: f64,
}

/// Compares a window's entropy to the baseline expectation.
///
/// Flooding from a small set of sources collapses the randomness of the
/// attribute distribution, so an entropy *drop* is the attack signal:
/// `z = (center - entropy) / max(spread, floor)`.
pub struct DeviationDetector {
    suspicious_z: f64,
    anomalous_z: f64,
}

impl DeviationDetector {
    /// Create a detector, enforcing `anomalous_z > suspicious_z > 0`.
    pub fn new(suspicious_z: f64, anomalous_z: f64) -> Result<Self, ConfigurationError> {
        if !(suspicious_z > 0.0 && anomalous_z > suspicious_z) {
            return Err(ConfigurationError::InvalidThresholds {
                suspicious: suspicious_z,
                anomalous: anomalous_z,
            });
        }
        Ok(Self {
            suspicious_z,
            anomalous_z,
        })
    }

    /// Classify one reading against the baseline.
    ///
    /// Hard precondition honored here: while the baseline is still warming
    /// up, every window classifies Normal regardless of the reading.
    pub fn classify(&self, reading: &EntropyReading, baseline: &BaselineTracker) -> Verdict {
        if !baseline.is_ready() {
            return Verdict {
                classification: Classification::Normal,
                deviation: 0.0,
            };
        }

        let state = baseline.snapshot();
        let deviation = (state.center - reading.entropy) / state.spread().max(SPREAD_FLOOR);
        let classification = if deviation >= self.anomalous_z {
            Classification::Anomalous
        } else if deviation >= self.suspicious_z {
            Classification::Suspicious
        } else {
            Classification::Normal
        };
        Verdict {
            classification,
            deviation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::baseline::BaselineState;

    fn ready_baseline(center: f64, spread: f64) -> BaselineTracker {
        BaselineTracker::restore(
            0.1,
            30,
            BaselineState {
                center,
                variance: spread * spread,
                windows_observed: 30,
            },
        )
    }

    fn reading(entropy: f64) -> EntropyReading {
        EntropyReading {
            entropy,
            total: 1000,
            distinct: 50,
        }
    }

    #[test]
    fn warmup_always_classifies_normal() {
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let mut warming = BaselineTracker::new(0.1, 30);
        for _ in 0..10 {
            warming.update(&reading(3.0));
        }

        let verdict = detector.classify(&reading(0.0), &warming);
        assert_eq!(verdict.classification, Classification::Normal);
        assert_eq!(verdict.deviation, 0.0);
    }

    #[test]
    fn moderate_drop_is_suspicious() {
        // center 3.0, spread 0.2: entropy 2.3 gives z = 3.5
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let baseline = ready_baseline(3.0, 0.2);

        let verdict = detector.classify(&reading(2.3), &baseline);
        assert_eq!(verdict.classification, Classification::Suspicious);
        assert!((verdict.deviation - 3.5).abs() < 1e-6, "z={}", verdict.deviation);
    }

    #[test]
    fn deep_drop_is_anomalous() {
        // center 3.0, spread 0.2: entropy 1.9 gives z = 5.5
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let baseline = ready_baseline(3.0, 0.2);

        let verdict = detector.classify(&reading(1.9), &baseline);
        assert_eq!(verdict.classification, Classification::Anomalous);
        assert!((verdict.deviation - 5.5).abs() < 1e-6, "z={}", verdict.deviation);
    }

    #[test]
    fn small_drop_is_normal() {
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let baseline = ready_baseline(3.0, 0.2);

        let verdict = detector.classify(&reading(2.9), &baseline);
        assert_eq!(verdict.classification, Classification::Normal);
        assert!(verdict.deviation > 0.0);
    }

    #[test]
    fn entropy_rise_is_normal_with_negative_deviation() {
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let baseline = ready_baseline(3.0, 0.2);

        let verdict = detector.classify(&reading(3.8), &baseline);
        assert_eq!(verdict.classification, Classification::Normal);
        assert!((verdict.deviation + 4.0).abs() < 1e-6, "z={}", verdict.deviation);
    }

    #[test]
    fn degenerate_spread_still_classifies() {
        let detector = DeviationDetector::new(2.0, 4.0).unwrap();
        let baseline = ready_baseline(3.0, 0.0);

        let verdict = detector.classify(&reading(2.9), &baseline);
        assert_eq!(verdict.classification, Classification::Anomalous);
        assert!(verdict.deviation.is_finite());
    }

    #[test]
    fn construction_rejects_bad_thresholds() {
        assert!(DeviationDetector::new(4.0, 2.0).is_err());
        assert!(DeviationDetector::new(0.0, 4.0).is_err());
        assert!(DeviationDetector::new(2.0, 2.0).is_err());
    }
}
