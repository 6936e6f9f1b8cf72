//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: missing
//! fields in the settings file take their compiled default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetmonSettings {
    /// HTTP / WebSocket listener settings.
    pub server: ServerSettings,
    /// External measurement tool and trigger settings.
    pub measurement: MeasurementSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl NetmonSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.measurement.period_minutes == 0 {
            return Err(SettingsError::InvalidValue(
                "measurement.periodMinutes must be at least 1".into(),
            ));
        }
        if self.measurement.trigger_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "measurement.triggerCapacity must be at least 1".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.measurement.command.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "measurement.command must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Directory served for non-WebSocket paths (the web UI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Seconds between WebSocket Ping frames.
    pub heartbeat_interval_secs: u64,
    /// `Origin` header values accepted on WebSocket upgrade. Empty accepts
    /// any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: Some("www".to_string()),
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            allowed_origins: Vec::new(),
        }
    }
}

/// Measurement tool and trigger settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementSettings {
    /// Program invoked for each measurement.
    pub command: String,
    /// Server to target; `None` lets the tool pick one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u32>,
    /// Minutes between periodic triggers.
    pub period_minutes: u64,
    /// Pending triggers buffered while a measurement runs.
    pub trigger_capacity: usize,
}

impl MeasurementSettings {
    /// Period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_minutes.saturating_mul(60))
    }
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            command: "speedtest-cli".to_string(),
            server_id: None,
            period_minutes: 60,
            trigger_capacity: 1,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(NetmonSettings::default()).unwrap();
        assert_eq!(value["server"]["sendQueueCapacity"], 256);
        assert_eq!(value["server"]["staticDir"], "www");
        assert_eq!(value["measurement"]["periodMinutes"], 60);
        assert!(value["measurement"].get("serverId").is_none());
        assert_eq!(value["server"]["allowedOrigins"], serde_json::json!([]));
    }

    #[test]
    fn period_in_minutes() {
        let m = MeasurementSettings {
            period_minutes: 5,
            ..MeasurementSettings::default()
        };
        assert_eq!(m.period(), Duration::from_secs(300));
    }

    #[test]
    fn zero_period_rejected() {
        let mut settings = NetmonSettings::default();
        settings.measurement.period_minutes = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn zero_trigger_capacity_rejected() {
        let mut settings = NetmonSettings::default();
        settings.measurement.trigger_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_rejected() {
        let mut settings = NetmonSettings::default();
        settings.server.heartbeat_interval_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn empty_command_rejected() {
        let mut settings = NetmonSettings::default();
        settings.measurement.command = "  ".into();
        assert!(settings.validate().is_err());
    }
}
