//! Windowed attribute tallying for the detection engine.
//!
//! This module maintains exact occurrence counts of attribute values within
//! the currently open time window and hands out frozen window snapshots at
//! rollover. It is the only component on the ingestion hot path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use parking_lot::Mutex;
use thiserror::Error;

use crate::core::AttributeValue;

/// Error returned when a sample's timestamp precedes the open window.
///
/// Recoverable by design: the caller decides whether to drop the sample or
/// re-route it; the engine itself is never affected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sample at {timestamp} precedes open window start {window_start}")]
pub struct OutOfWindowError {
    pub timestamp: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
}

/// A half-open time interval `[start, end)` and the occurrence counts of
/// the attribute values observed inside it.
///
/// Owned exclusively by the [`AttributeTally`] while open; frozen and
/// passed by value to the detection pass at rollover. Memory is bounded by
/// the distinct-value cap, not by sample volume: once the cap is reached,
/// values not already tracked are folded into an aggregate overflow bucket
/// so window totals stay exact under cardinality-explosion conditions.
#[derive(Debug, Clone)]
pub struct Window<V: AttributeValue> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    counts: HashMap<V, u64>,
    overflow: u64,
    evicted: u64,
    total: u64,
}

impl<V: AttributeValue> Window<V> {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            counts: HashMap::new(),
            overflow: 0,
            evicted: 0,
            total: 0,
        }
    }

    fn admit(&mut self, value: V, max_distinct: usize) {
        if let Some(count) = self.counts.get_mut(&value) {
            *count += 1;
        } else if self.counts.len() < max_distinct {
            self.counts.insert(value, 1);
        } else {
            self.overflow += 1;
            self.evicted += 1;
            if self.evicted == 1 {
                warn!(
                    "distinct-value cap {} reached for window starting {}; folding further new values into the overflow bucket",
                    max_distinct, self.start
                );
            }
        }
        self.total += 1;
    }

    /// Number of samples admitted to this window.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct values with exact counts.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Iterate over the exactly-counted values.
    pub fn iter(&self) -> impl Iterator<Item = (&V, u64)> {
        self.counts.iter().map(|(value, count)| (value, *count))
    }

    /// Aggregate count of samples whose values were folded past the cap.
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Whether the distinct-value cap was hit during this window.
    pub fn capped(&self) -> bool {
        self.evicted > 0
    }

    /// Number of samples folded into the overflow bucket.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

struct TallyInner<V: AttributeValue> {
    window: Mutex<Window<V>>,
    window_len: Duration,
    max_distinct: usize,
}

/// Concurrent tally of attribute values for the open window.
///
/// Cheaply cloneable handle; clones share the same open window. `record`
/// is safe to call from many threads at once, and rollover is atomic with
/// respect to concurrent records: every sample lands in exactly one
/// window, never duplicated or lost across the boundary. The critical
/// section is a single hash-map update.
pub struct AttributeTally<V: AttributeValue> {
    inner: Arc<TallyInner<V>>,
}

impl<V: AttributeValue> Clone for AttributeTally<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: AttributeValue> AttributeTally<V> {
    /// Create a tally whose first window opens at `start`.
    pub fn new(start: DateTime<Utc>, window_len: Duration, max_distinct: usize) -> Self {
        Self {
            inner: Arc::new(TallyInner {
                window: Mutex::new(Window::new(start, start + window_len)),
                window_len,
                max_distinct,
            }),
        }
    }

    /// Admit one sample into the open window.
    ///
    /// # Arguments
    ///
    /// * `value` - The observed attribute value
    /// * `timestamp` - The observation time
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sample was admitted
    /// * `Err(OutOfWindowError)` if `timestamp` precedes the open window's
    ///   start (late sample); the caller decides whether to drop or re-route
    ///
    /// Samples timestamped at or after the nominal window end that arrive
    /// before the rollover tick are admitted to the still-open window; the
    /// skew is bounded by the rollover timer's latency.
    pub fn record(&self, value: V, timestamp: DateTime<Utc>) -> Result<(), OutOfWindowError> {
        let rejected_by = {
            let mut window = self.inner.window.lock();
            if timestamp < window.start {
                Some(window.start)
            } else {
                window.admit(value, self.inner.max_distinct);
                None
            }
        };
        match rejected_by {
            Some(window_start) => {
                metrics::increment_counter!("flood_sentinel_samples_rejected_total");
                Err(OutOfWindowError {
                    timestamp,
                    window_start,
                })
            }
            None => {
                metrics::increment_counter!("flood_sentinel_samples_admitted_total");
                Ok(())
            }
        }
    }

    /// Freeze and return the open window, atomically opening the next one.
    ///
    /// The next window's `start` equals the previous window's `end`, so
    /// consecutive windows tile time with no gap and no overlap.
    pub fn close_window(&self) -> Window<V> {
        let closed = {
            let mut window = self.inner.window.lock();
            let next_start = window.end;
            let next = Window::new(next_start, next_start + self.inner.window_len);
            std::mem::replace(&mut *window, next)
        };
        if closed.capped() {
            metrics::counter!("flood_sentinel_samples_evicted_total", closed.evicted());
        }
        closed
    }

    /// Bounds `[start, end)` of the currently open window.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let window = self.inner.window.lock();
        (window.start, window.end)
    }
}
