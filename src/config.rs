//! Configuration for the APM meter.

use crate::core::quantizer::StepTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the meter application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate engine tuning
    pub engine: EngineConfig,

    /// How often the display rate is polled
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Directory session reports are written to
    pub export_path: PathBuf,

    /// Directory for application data
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apm-meter");

        Self {
            engine: EngineConfig::default(),
            poll_interval: Duration::from_millis(200),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apm-meter")
            .join("config.json")
    }
}

/// Tuning constants read by the rate engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of one-second buckets in the rolling window
    pub window_secs: usize,

    /// EMA smoothing constant (higher reacts faster)
    pub ema_alpha: f64,

    /// Idle time after which the mild decay applies
    #[serde(with = "duration_millis")]
    pub mild_decay_after: Duration,
    pub mild_decay_factor: f64,

    /// Idle time after which the strong decay applies
    #[serde(with = "duration_millis")]
    pub strong_decay_after: Duration,
    pub strong_decay_factor: f64,

    /// Display step size as a function of the displayed value
    pub step_table: StepTable,

    /// A jump larger than this many steps counts as "large"
    pub large_jump_steps: u32,

    #[serde(with = "duration_millis")]
    pub rise_delay_large: Duration,
    #[serde(with = "duration_millis")]
    pub fall_delay_large: Duration,
    #[serde(with = "duration_millis")]
    pub rise_delay_small: Duration,
    #[serde(with = "duration_millis")]
    pub fall_delay_small: Duration,

    /// Maximum number of retained history samples
    pub history_capacity: usize,

    /// Minimum spacing between history samples
    #[serde(with = "duration_millis")]
    pub history_interval: Duration,

    /// Sessions shorter than this report the raw event total as their average
    #[serde(with = "duration_millis")]
    pub average_floor: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            ema_alpha: 0.15,
            mild_decay_after: Duration::from_secs(3),
            mild_decay_factor: 0.94,
            strong_decay_after: Duration::from_secs(6),
            strong_decay_factor: 0.90,
            step_table: StepTable::default(),
            large_jump_steps: 2,
            rise_delay_large: Duration::from_millis(50),
            fall_delay_large: Duration::from_millis(100),
            rise_delay_small: Duration::from_millis(80),
            fall_delay_small: Duration::from_millis(150),
            history_capacity: 120,
            history_interval: Duration::from_secs(5),
            average_floor: Duration::from_secs(6),
        }
    }
}

impl EngineConfig {
    /// The slower-reacting smoothing variant.
    pub fn legacy() -> Self {
        Self {
            ema_alpha: 0.02,
            ..Self::default()
        }
    }

    /// Override the smoothing constant.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.ema_alpha = alpha;
        self
    }

    /// Check that every tunable is within a usable range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("window_secs must be at least 1".into()));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "ema_alpha must be in (0, 1], got {}",
                self.ema_alpha
            )));
        }
        for (name, factor) in [
            ("mild_decay_factor", self.mild_decay_factor),
            ("strong_decay_factor", self.strong_decay_factor),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in [0, 1], got {factor}"
                )));
            }
        }
        if self.strong_decay_after < self.mild_decay_after {
            return Err(ConfigError::Invalid(
                "strong_decay_after must not be shorter than mild_decay_after".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".into(),
            ));
        }
        self.step_table.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.engine.window_secs, 60);
        assert_eq!(config.engine.history_capacity, 120);
        assert!((config.engine.ema_alpha - 0.15).abs() < f64::EPSILON);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn test_legacy_only_changes_alpha() {
        let legacy = EngineConfig::legacy();
        assert!((legacy.ema_alpha - 0.02).abs() < f64::EPSILON);
        assert_eq!(legacy.with_alpha(0.15), EngineConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(EngineConfig::default().with_alpha(0.0).validate().is_err());
        assert!(EngineConfig::default().with_alpha(1.5).validate().is_err());

        let config = EngineConfig {
            strong_decay_factor: 1.2,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = EngineConfig {
            window_secs: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["rise_delay_large"], 50);
        assert_eq!(json["history_interval"], 5000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "engine": { "ema_alpha": 0.3 }, "poll_interval": 100 }"#)
                .unwrap();
        assert!((config.engine.ema_alpha - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.engine.window_secs, 60);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("apm-meter-config-{}", std::process::id()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.engine = EngineConfig::legacy();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.engine, config.engine);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("apm-meter-does-not-exist/config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
    }
}
