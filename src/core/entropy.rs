//! Shannon entropy estimation over a frozen window.

use serde::{Deserialize, Serialize};

use crate::core::tally::Window;
use crate::core::AttributeValue;

/// Entropy of one closed window, in bits per observation, together with
/// the sample counts it was computed from.
///
/// Invariant: `0 <= entropy <= log2(distinct)`, with the overflow bucket
/// counted as one distinct mass. An empty window reads as 0 bits: no
/// traffic carries no information, which is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropyReading {
    /// Shannon entropy in bits per observation
    pub entropy: f64,
    /// Total samples in the window
    pub total: u64,
    /// Distinct masses in the distribution (tracked values, plus one if
    /// the overflow bucket is non-empty)
    pub distinct: u64,
}

/// Estimate the Shannon entropy of a closed window.
///
/// For each value with count `c` out of `n` total samples, `p = c/n`
/// contributes `-p*log2(p)`; only values with `c > 0` are summed, so the
/// `p*log2(p) -> 0` convention never produces a NaN. The overflow bucket
/// contributes as a single mass. Pure function of its input.
pub fn estimate<V: AttributeValue>(window: &Window<V>) -> EntropyReading {
    let total = window.total();
    if total == 0 {
        return EntropyReading {
            entropy: 0.0,
            total: 0,
            distinct: 0,
        };
    }

    let n = total as f64;
    let mut entropy = 0.0;
    for (_, count) in window.iter() {
        let p = count as f64 / n;
        entropy -= p * p.log2();
    }
    if window.overflow() > 0 {
        let p = window.overflow() as f64 / n;
        entropy -= p * p.log2();
    }

    let distinct = window.distinct() as u64 + u64::from(window.overflow() > 0);
    EntropyReading {
        // Float dust can push a one-value distribution epsilon below zero.
        entropy: entropy.max(0.0),
        total,
        distinct,
    }
}
