//! Flood Sentinel
//!
//! A streaming anomaly-detection engine that distinguishes legitimate
//! network traffic from volumetric flooding by measuring the Shannon
//! entropy of traffic attributes over time. Flooding from a small set of
//! sources collapses the randomness of the attribute distribution, so the
//! engine tallies attribute values per time window, compares each window's
//! entropy against an adaptive baseline, and emits a classified event per
//! window naming the likely offenders when the drop is significant.
//!
//! Capture/parsing, blocking, alert transport and dashboards are external
//! collaborators: they feed samples in through a recorder handle and
//! receive events through a sink.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use flood_sentinel::core::{ChannelSink, DetectionEngine};
//! use flood_sentinel::models::EngineConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (sink, mut events) = ChannelSink::new();
//!     let engine: DetectionEngine<String> =
//!         DetectionEngine::new(EngineConfig::default(), Arc::new(sink))?;
//!     let handle = engine.spawn();
//!
//!     let recorder = handle.recorder();
//!     recorder.record("198.51.100.7".to_string(), Utc::now())?;
//!
//!     if let Some(event) = events.recv().await {
//!         println!("window closed: {:?}", event.classification);
//!     }
//!     handle.shutdown().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod models;

pub use crate::core::{
    AttributeTally, AttributeValue, BaselineState, BaselineTracker, ChannelSink, Classification,
    Contributor, ContributorRanker, DetectionEngine, DeviationDetector, EngineHandle, EngineState,
    EntropyReading, EventSink, OutOfWindowError, Verdict, Window, WindowEvent,
};
pub use crate::models::{ConfigurationError, EngineConfig};
