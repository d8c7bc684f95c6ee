//! Layered settings: optional file, then `DMS_*` environment overrides

use std::path::Path;

use alerting::GateConfig;
use config::{Config, Environment, File};
use dms::DetectionConfig;
use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub detection: DetectionConfig,
    pub gate: GateConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            gate: GateConfig::default(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl MonitorSettings {
    /// Load settings; format is taken from the file extension.
    ///
    /// Nested keys are overridden with `__`, e.g. `DMS_GATE__RED_HOLD_MS=3000`.
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings: Self = builder
            .add_source(
                Environment::with_prefix("DMS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.detection.validate()?;
        self.gate.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MonitorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.gate.red_hold_ms, 5000);
        assert_eq!(settings.detection.repeated_event_window_ms, 60_000);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("dms-settings-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "log_level = \"debug\"\n\
             [gate]\nyellow_hold_ms = 1500\n\
             [detection.timing]\nfall_min_ms = 3500\n",
        )
        .unwrap();

        let settings = MonitorSettings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.gate.yellow_hold_ms, 1500);
        assert_eq!(settings.detection.timing.fall_min_ms, 3500);
        assert_eq!(settings.detection.timing.quick_fall_min_ms, 1001);
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("DMS_GATE__RED_HOLD_MS", "3000");
        let settings = MonitorSettings::load(None).unwrap();
        std::env::remove_var("DMS_GATE__RED_HOLD_MS");

        assert_eq!(settings.gate.red_hold_ms, 3000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("dms-settings-does-not-exist.toml");
        assert!(matches!(
            MonitorSettings::load(Some(&path)),
            Err(MonitorError::Settings(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = MonitorSettings::default();
        settings.detection.timing.quick_fall_min_ms = 4000;
        assert!(matches!(settings.validate(), Err(MonitorError::Detection(_))));
    }
}
