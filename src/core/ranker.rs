//! Ranking of the attribute values behind an anomalous window.
//!
//! Ranking is presentation work for a mitigation decision, so it runs only
//! for windows the detector classified anomalous, never on the per-window
//! fast path.

use serde::Serialize;

use crate::core::tally::Window;
use crate::core::AttributeValue;

/// One attribute value and its share of the window's traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contributor<V> {
    pub value: V,
    pub count: u64,
    pub share: f64,
}

/// Ranks values by their share of a closed window's traffic.
pub struct ContributorRanker {
    top_k: usize,
    min_share: f64,
}

impl ContributorRanker {
    pub fn new(top_k: usize, min_share: f64) -> Self {
        Self { top_k, min_share }
    }

    /// Rank the window's values by descending share.
    ///
    /// Only values whose share strictly exceeds the minimum are reported,
    /// truncated to the top K. Ties are broken by the value's natural
    /// ordering so the output is deterministic. The overflow bucket is
    /// never ranked; its values cannot be named.
    pub fn rank<V: AttributeValue>(&self, window: &Window<V>) -> Vec<Contributor<V>> {
        let total = window.total();
        if total == 0 {
            return Vec::new();
        }

        let n = total as f64;
        let mut contributors: Vec<Contributor<V>> = window
            .iter()
            .filter(|(_, count)| *count as f64 / n > self.min_share)
            .map(|(value, count)| Contributor {
                value: value.clone(),
                count,
                share: count as f64 / n,
            })
            .collect();

        // Share order equals count order within one window, so sorting on
        // the integer count avoids float comparisons entirely.
        contributors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        contributors.truncate(self.top_k);
        contributors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::core::tally::AttributeTally;

    fn window_of(samples: &[(&str, u64)]) -> Window<String> {
        let tally = AttributeTally::new(Utc::now(), Duration::seconds(60), 1024);
        let (start, _) = tally.bounds();
        for (value, count) in samples {
            for _ in 0..*count {
                tally.record(value.to_string(), start).unwrap();
            }
        }
        tally.close_window()
    }

    #[test]
    fn ranks_by_descending_share() {
        let ranker = ContributorRanker::new(10, 0.0);
        let window = window_of(&[("a", 1), ("b", 5), ("c", 3)]);

        let ranked = ranker.rank(&window);
        let order: Vec<&str> = ranked.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!((ranked[0].share - 5.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_value_order() {
        let ranker = ContributorRanker::new(10, 0.0);
        let window = window_of(&[("zebra", 4), ("alpha", 4), ("mid", 4)]);

        let ranked = ranker.rank(&window);
        let order: Vec<&str> = ranked.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(order, vec!["alpha", "mid", "zebra"]);
    }

    #[test]
    fn filters_below_minimum_share() {
        let ranker = ContributorRanker::new(10, 0.2);
        let window = window_of(&[("big", 8), ("small", 1), ("tiny", 1)]);

        let ranked = ranker.rank(&window);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].value, "big");
    }

    #[test]
    fn minimum_share_is_strict() {
        // Exactly at the boundary does not qualify.
        let ranker = ContributorRanker::new(10, 0.25);
        let window = window_of(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
        assert!(ranker.rank(&window).is_empty());
    }

    #[test]
    fn truncates_to_top_k() {
        let ranker = ContributorRanker::new(2, 0.0);
        let window = window_of(&[("a", 5), ("b", 4), ("c", 3), ("d", 2)]);

        let ranked = ranker.rank(&window);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].value, "a");
        assert_eq!(ranked[1].value, "b");
    }

    #[test]
    fn empty_window_ranks_nothing() {
        let ranker = ContributorRanker::new(10, 0.0);
        assert!(ranker.rank(&window_of(&[])).is_empty());
    }
}
