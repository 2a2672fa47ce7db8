//! Detection engine orchestration.
//!
//! This module wires the tally, entropy estimator, baseline tracker,
//! deviation detector and contributor ranker together: a background task
//! rolls the window over on a wall-clock timer, runs the detection pass on
//! the frozen snapshot, and emits one event per closed window to the
//! registered sink. Ingestion never waits on detection.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::core::baseline::{BaselineState, BaselineTracker};
use crate::core::detector::{Classification, DeviationDetector, Verdict};
use crate::core::entropy::{self, EntropyReading};
use crate::core::ranker::{Contributor, ContributorRanker};
use crate::core::tally::{AttributeTally, Window};
use crate::core::AttributeValue;
use crate::models::{ConfigurationError, EngineConfig};

/// Engine lifecycle state.
///
/// `Mitigating` is the sticky post-anomaly state used for hysteresis: it
/// holds until the configured number of consecutive Normal windows has
/// been observed, so a flapping attacker cannot raise one alert per
/// window edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    WarmingUp,
    Monitoring,
    Mitigating { normal_streak: u32 },
}

/// Event emitted to the sink for every closed window.
///
/// The engine does not retain events after emission; persistence and any
/// downstream blocking action belong to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct WindowEvent<V: AttributeValue> {
    pub id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub reading: EntropyReading,
    pub classification: Classification,
    /// Signed deviation score; positive for an entropy drop
    pub deviation: f64,
    pub baseline: BaselineState,
    /// Ranked offenders, present only for Anomalous windows
    pub contributors: Option<Vec<Contributor<V>>>,
    /// Whether the distinct-value cap was hit during the window
    pub cardinality_capped: bool,
    /// Samples folded into the overflow bucket
    pub evicted_samples: u64,
    /// Engine state after this window was processed
    pub state: EngineState,
}

impl<V: AttributeValue> WindowEvent<V> {
    /// JSON form of the event, as sinks typically ship or persist it.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receiver of per-window events.
///
/// Implementations must not block for long: they run on the detection
/// task. Hand the event off (channel, queue) if delivery is slow.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink<V: AttributeValue>: Send + Sync {
    fn emit(&self, event: WindowEvent<V>);
}

/// Sink adapter that forwards events into an unbounded tokio channel.
pub struct ChannelSink<V: AttributeValue> {
    tx: mpsc::UnboundedSender<WindowEvent<V>>,
}

impl<V: AttributeValue> ChannelSink<V> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WindowEvent<V>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<V: AttributeValue> EventSink<V> for ChannelSink<V> {
    fn emit(&self, event: WindowEvent<V>) {
        if self.tx.send(event).is_err() {
            warn!("event receiver dropped; discarding window event");
        }
    }
}

/// Streaming anomaly-detection engine for one monitored attribute class.
///
/// Construct one engine per attribute class (source address, packet size,
/// ...); engines share no mutable state and run fully in parallel.
pub struct DetectionEngine<V: AttributeValue> {
    config: EngineConfig,
    tally: AttributeTally<V>,
    baseline: BaselineTracker,
    detector: DeviationDetector,
    ranker: ContributorRanker,
    state: EngineState,
    sink: Arc<dyn EventSink<V>>,
}

impl<V: AttributeValue> DetectionEngine<V> {
    /// Create an engine; fails fast on an invalid configuration.
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn EventSink<V>>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let detector = DeviationDetector::new(config.suspicious_z, config.anomalous_z)?;
        let tally = AttributeTally::new(
            Utc::now(),
            Duration::seconds(config.window_secs as i64),
            config.max_distinct_values,
        );
        let baseline = BaselineTracker::new(config.smoothing_alpha, config.warmup_windows);
        let ranker = ContributorRanker::new(config.top_k, config.min_share);
        Ok(Self {
            config,
            tally,
            baseline,
            detector,
            ranker,
            state: EngineState::WarmingUp,
            sink,
        })
    }

    /// Cheap cloneable handle for the ingestion path.
    pub fn recorder(&self) -> AttributeTally<V> {
        self.tally.clone()
    }

    /// Resume from a baseline persisted by an external collaborator.
    ///
    /// A restored baseline that already covers the warm-up requirement
    /// puts the engine straight into Monitoring.
    pub fn restore_baseline(&mut self, state: BaselineState) {
        self.baseline = BaselineTracker::restore(
            self.config.smoothing_alpha,
            self.config.warmup_windows,
            state,
        );
        if self.baseline.is_ready() {
            self.state = EngineState::Monitoring;
        }
    }

    /// Start the rollover worker, consuming the engine.
    pub fn spawn(self) -> EngineHandle<V> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let recorder = self.tally.clone();
        let join = tokio::spawn(self.run(shutdown_rx));
        EngineHandle {
            recorder,
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = std::time::Duration::from_secs(self.config.window_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume it so the
        // first window gets a full period.
        ticker.tick().await;
        info!(
            "detection engine started: {}s windows, warm-up {} windows",
            self.config.window_secs, self.config.warmup_windows
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let window = self.tally.close_window();
                    let event = self.process_window(window);
                    self.sink.emit(event);
                }
                _ = shutdown.changed() => {
                    if self.config.drain_on_shutdown {
                        let window = self.tally.close_window();
                        let event = self.process_window(window);
                        self.sink.emit(event);
                    } else {
                        debug!("discarding in-flight window on shutdown");
                    }
                    break;
                }
            }
        }
        info!("detection engine stopped");
    }

    /// Run the detection pass for one frozen window.
    ///
    /// Order matters: classification consults the baseline as it stood
    /// when the window closed, the baseline is folded afterwards (unless
    /// frozen by an alert), and the state transition sees the post-update
    /// readiness.
    fn process_window(&mut self, window: Window<V>) -> WindowEvent<V> {
        let reading = entropy::estimate(&window);
        let verdict = if reading.total == 0 {
            // Silence is not evidence of flooding.
            Verdict {
                classification: Classification::Normal,
                deviation: 0.0,
            }
        } else {
            self.detector.classify(&reading, &self.baseline)
        };

        let contributors = (verdict.classification == Classification::Anomalous)
            .then(|| self.ranker.rank(&window));

        let frozen = self.config.freeze_baseline_on_alert
            && verdict.classification != Classification::Normal;
        if reading.total > 0 && !frozen {
            self.baseline.update(&reading);
        }

        let previous = self.state;
        self.state = self.next_state(verdict.classification);
        if self.state != previous {
            info!("engine state {:?} -> {:?}", previous, self.state);
        }

        match verdict.classification {
            Classification::Anomalous => {
                metrics::increment_counter!("flood_sentinel_anomalous_windows_total");
                warn!(
                    "anomalous window [{} - {}): entropy {:.3} bits over {} samples, deviation {:.2}",
                    window.start, window.end, reading.entropy, reading.total, verdict.deviation
                );
            }
            Classification::Suspicious => {
                info!(
                    "suspicious window [{} - {}): entropy {:.3} bits, deviation {:.2}",
                    window.start, window.end, reading.entropy, verdict.deviation
                );
            }
            Classification::Normal => {
                if verdict.deviation < 0.0 {
                    // Rises are informational only; see the detector policy.
                    debug!(
                        "entropy rise in window [{} - {}): deviation {:.2}",
                        window.start, window.end, verdict.deviation
                    );
                }
            }
        }

        let baseline = self.baseline.snapshot();
        metrics::increment_counter!("flood_sentinel_windows_closed_total");
        metrics::histogram!("flood_sentinel_window_entropy_bits", reading.entropy);
        metrics::gauge!("flood_sentinel_baseline_center_bits", baseline.center);

        WindowEvent {
            id: Uuid::new_v4(),
            window_start: window.start,
            window_end: window.end,
            reading,
            classification: verdict.classification,
            deviation: verdict.deviation,
            baseline,
            contributors,
            cardinality_capped: window.capped(),
            evicted_samples: window.evicted(),
            state: self.state,
        }
    }

    /// Explicit transition table over (state, classification).
    fn next_state(&self, classification: Classification) -> EngineState {
        let hold = self.config.mitigation_hold_windows;
        match (self.state, classification) {
            (EngineState::WarmingUp, _) => {
                if self.baseline.is_ready() {
                    EngineState::Monitoring
                } else {
                    EngineState::WarmingUp
                }
            }
            (EngineState::Monitoring, Classification::Anomalous) if hold > 0 => {
                EngineState::Mitigating { normal_streak: 0 }
            }
            (EngineState::Monitoring, _) => EngineState::Monitoring,
            (EngineState::Mitigating { normal_streak }, Classification::Normal) => {
                let streak = normal_streak + 1;
                if streak >= hold {
                    EngineState::Monitoring
                } else {
                    EngineState::Mitigating {
                        normal_streak: streak,
                    }
                }
            }
            (EngineState::Mitigating { .. }, _) => EngineState::Mitigating { normal_streak: 0 },
        }
    }
}

/// Handle to a running engine: the ingestion recorder plus shutdown.
pub struct EngineHandle<V: AttributeValue> {
    recorder: AttributeTally<V>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl<V: AttributeValue> EngineHandle<V> {
    /// Recorder handle for the ingestion collaborator.
    pub fn recorder(&self) -> AttributeTally<V> {
        self.recorder.clone()
    }

    /// Stop the engine. The in-flight window is drained or discarded per
    /// configuration; the baseline is never left partially updated.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // The task may already have exited; a dead receiver is fine.
        let _ = self.shutdown.send(true);
        self.join
            .await
            .context("detection engine task terminated abnormally")?;
        Ok(())
    }
}
