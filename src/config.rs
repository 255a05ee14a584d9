//! Connection and acquisition settings.
//!
//! Configuration is loaded from:
//! 1. `ngmo2.toml` (base configuration)
//! 2. Environment variables prefixed with `NGMO2_`, e.g. `NGMO2_NOTIFICATION_TIMEOUT_MS=20000`
//!
//! Every field has a default, so both sources are optional.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use fugit::MillisDurationU32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parameter::DATA_FORMAT;
use crate::validate::ParamValue;

pub const DEFAULT_FILE: &str = "ngmo2.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address of the instrument, e.g. a VISA resource string. Informational for stream
    /// transports.
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Data format selected when connecting.
    #[serde(default = "default_data_format")]
    pub data_format: String,
    /// Upper bound on the wait for an acquisition to signal completion.
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout_ms: u32,
    /// Status byte poll interval of transports without a service request line.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u32,
}

fn default_resource() -> String {
    "GPIB0::4::INSTR".to_string()
}

fn default_data_format() -> String {
    "ASC".to_string()
}

fn default_notification_timeout() -> u32 {
    10_000
}

fn default_poll_interval() -> u32 {
    50
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            data_format: default_data_format(),
            notification_timeout_ms: default_notification_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl DeviceConfig {
    /// Load configuration from `ngmo2.toml` in the working directory and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_FILE)
    }

    /// Load configuration from a specific file path, then validate it.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NGMO2_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "notification_timeout_ms must be positive".into(),
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.notification_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be in [1, {}]",
                self.notification_timeout_ms
            )));
        }
        DATA_FORMAT
            .validate(&ParamValue::from(self.data_format.as_str()))
            .map_err(|e| ConfigError::Invalid(format!("data_format: {e}")))?;
        Ok(())
    }

    pub fn notification_timeout(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.notification_timeout_ms)
    }

    pub fn poll_interval(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|_jail| {
            let config = DeviceConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, DeviceConfig::default());
            assert_eq!(config.resource, "GPIB0::4::INSTR");
            assert_eq!(config.notification_timeout().to_millis(), 10_000);
            Ok(())
        });
    }

    #[test]
    fn file_and_environment_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ngmo2.toml",
                r#"
                resource = "GPIB0::7::INSTR"
                data_format = "sreal"
                notification_timeout_ms = 20000
                "#,
            )?;
            jail.set_env("NGMO2_POLL_INTERVAL_MS", "10");
            jail.set_env("NGMO2_NOTIFICATION_TIMEOUT_MS", "30000");

            let config = DeviceConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.resource, "GPIB0::7::INSTR");
            assert_eq!(config.data_format, "sreal");
            assert_eq!(config.notification_timeout_ms, 30_000);
            assert_eq!(config.poll_interval_ms, 10);
            Ok(())
        });
    }

    #[test]
    fn unknown_data_format_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("ngmo2.toml", r#"data_format = "JSON""#)?;
            let result = DeviceConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("ngmo2.toml", "notification_timeout_ms = \"soon\"")?;
            assert!(matches!(DeviceConfig::load(), Err(ConfigError::Load(_))));
            Ok(())
        });
    }

    #[test]
    fn validation() {
        let mut config = DeviceConfig::default();
        assert!(config.validate().is_ok());

        config.notification_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.notification_timeout_ms = 100;
        config.poll_interval_ms = 200;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
