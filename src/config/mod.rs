//! Configuration loading for the detection engine.
//!
//! This module handles loading the engine configuration from a TOML file
//! layered with environment variables, falling back to built-in defaults.

use config::{Config as ConfigBuilder, Environment, File};
use std::env;

use crate::models::{ConfigurationError, EngineConfig};

/// Load and validate the engine configuration.
///
/// Sources, in increasing precedence: built-in defaults, the file named by
/// `CONFIG_FILE` (default `config/default.toml`, optional), environment
/// variables. The result is validated before it is returned.
pub fn load_config() -> Result<EngineConfig, ConfigurationError> {
    dotenv::dotenv().ok();

    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::default())
        .set_default("window_secs", 60)?
        .set_default("warmup_windows", 30)?
        .set_default("smoothing_alpha", 0.1)?
        .set_default("suspicious_z", 3.0)?
        .set_default("anomalous_z", 6.0)?
        .set_default("freeze_baseline_on_alert", true)?
        .set_default("top_k", 10)?
        .set_default("min_share", 0.05)?
        .set_default("mitigation_hold_windows", 3)?
        .set_default("max_distinct_values", 65_536)?
        .set_default("drain_on_shutdown", true)?
        .build()?;

    let config: EngineConfig = config.try_deserialize().map_err(ConfigurationError::Load)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_config_default() {
        let loaded = load_config().expect("defaults should load");
        let built_in = EngineConfig::default();
        assert_eq!(loaded.window_secs, built_in.window_secs);
        assert_eq!(loaded.warmup_windows, built_in.warmup_windows);
        assert_eq!(loaded.suspicious_z, built_in.suspicious_z);
        assert_eq!(loaded.anomalous_z, built_in.anomalous_z);
        assert_eq!(loaded.max_distinct_values, built_in.max_distinct_values);
    }
}
