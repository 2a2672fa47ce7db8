//! Core detection components.
//!
//! This module contains the detection pipeline of the engine: windowed
//! attribute tallying, entropy estimation, baseline tracking, deviation
//! classification, contributor ranking, and the orchestrating engine.

pub mod baseline;
pub mod detector;
pub mod engine;
pub mod entropy;
pub mod ranker;
pub mod tally;

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;

/// Marker trait for attribute value types the engine can monitor, e.g. a
/// source address, a packet size, or a destination port.
///
/// Values are opaque tokens to the engine: they are counted, compared for
/// ranking order, and echoed back in events, never inspected. The trait is
/// blanket-implemented for every type with the required bounds.
pub trait AttributeValue:
    Eq + Hash + Ord + Clone + Send + Sync + Debug + Serialize + 'static
{
}

impl<T> AttributeValue for T where
    T: Eq + Hash + Ord + Clone + Send + Sync + Debug + Serialize + 'static
{
}

pub use baseline::{BaselineState, BaselineTracker};
pub use detector::{Classification, DeviationDetector, Verdict};
pub use engine::{ChannelSink, DetectionEngine, EngineHandle, EngineState, EventSink, WindowEvent};
pub use entropy::EntropyReading;
pub use ranker::{Contributor, ContributorRanker};
pub use tally::{AttributeTally, OutOfWindowError, Window};
