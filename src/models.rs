use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or validating an engine configuration.
///
/// All variants are construction-time failures; a configuration that
/// validates never produces errors from these checks at runtime.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("window duration must be positive")]
    NonPositiveWindow,
    #[error("smoothing factor must lie in (0, 1), got {0}")]
    InvalidSmoothing(f64),
    #[error("z-thresholds must satisfy anomalous > suspicious > 0 (suspicious={suspicious}, anomalous={anomalous})")]
    InvalidThresholds { suspicious: f64, anomalous: f64 },
    #[error("warm-up must cover at least one window")]
    InvalidWarmup,
    #[error("minimum contributor share must lie in [0, 1), got {0}")]
    InvalidMinShare(f64),
    #[error("contributor top-k must be positive")]
    InvalidTopK,
    #[error("distinct-value cap must be positive")]
    InvalidCardinalityCap,
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Detection engine configuration
///
/// Set once at construction and immutable afterwards. One configuration
/// (and one engine) per monitored attribute class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window duration in seconds
    pub window_secs: u64,
    /// Number of closed windows folded into the baseline before
    /// classifications go live; every window before that is Normal
    pub warmup_windows: u32,
    /// Smoothing factor for the baseline, in (0, 1); higher adapts
    /// faster but is noisier
    pub smoothing_alpha: f64,
    /// Deviation (in spreads) at which a window becomes Suspicious
    pub suspicious_z: f64,
    /// Deviation (in spreads) at which a window becomes Anomalous
    pub anomalous_z: f64,
    /// Suppress the baseline update for Suspicious/Anomalous windows so an
    /// ongoing flood is not learned as normal
    pub freeze_baseline_on_alert: bool,
    /// Maximum number of contributors reported for an anomalous window
    pub top_k: usize,
    /// Minimum share of window traffic a value must exceed to be reported
    pub min_share: f64,
    /// Consecutive Normal windows required to leave the Mitigating state;
    /// 0 disables the sticky state entirely
    pub mitigation_hold_windows: u32,
    /// Cap on distinct values tracked per window; further values fold into
    /// an aggregate bucket so totals stay exact
    pub max_distinct_values: usize,
    /// Whether the in-flight window is processed or discarded on shutdown
    pub drain_on_shutdown: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            warmup_windows: 30,
            smoothing_alpha: 0.1,
            suspicious_z: 3.0,
            anomalous_z: 6.0,
            freeze_baseline_on_alert: true,
            top_k: 10,
            min_share: 0.05,
            mitigation_hold_windows: 3,
            max_distinct_values: 65_536,
            drain_on_shutdown: true,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, failing fast on any inconsistency.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.window_secs == 0 {
            return Err(ConfigurationError::NonPositiveWindow);
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha < 1.0) {
            return Err(ConfigurationError::InvalidSmoothing(self.smoothing_alpha));
        }
        if !(self.suspicious_z > 0.0 && self.anomalous_z > self.suspicious_z) {
            return Err(ConfigurationError::InvalidThresholds {
                suspicious: self.suspicious_z,
                anomalous: self.anomalous_z,
            });
        }
        if self.warmup_windows == 0 {
            return Err(ConfigurationError::InvalidWarmup);
        }
        if !(0.0..1.0).contains(&self.min_share) {
            return Err(ConfigurationError::InvalidMinShare(self.min_share));
        }
        if self.top_k == 0 {
            return Err(ConfigurationError::InvalidTopK);
        }
        if self.max_distinct_values == 0 {
            return Err(ConfigurationError::InvalidCardinalityCap);
        }
        Ok(())
    }
}
