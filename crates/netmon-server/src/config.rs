//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use netmon_settings::NetmonSettings;

/// Immutable configuration handed to [`crate::server::NetmonServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Directory served for non-API paths, if any.
    pub static_dir: Option<PathBuf>,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Accepted `Origin` values on upgrade; empty accepts any.
    pub allowed_origins: Vec<String>,
    /// Server the measurement tool should target.
    pub server_id: Option<u32>,
    /// Periodic trigger interval; `None` disables the periodic trigger.
    pub measurement_period: Option<Duration>,
    /// Trigger buffer size; triggers beyond it are coalesced.
    pub trigger_capacity: usize,
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    pub fn from_settings(settings: &NetmonSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            static_dir: settings.server.static_dir.as_ref().map(PathBuf::from),
            send_queue_capacity: settings.server.send_queue_capacity,
            heartbeat_interval: Duration::from_secs(settings.server.heartbeat_interval_secs),
            allowed_origins: settings.server.allowed_origins.clone(),
            server_id: settings.measurement.server_id,
            measurement_period: Some(settings.measurement.period()),
            trigger_capacity: settings.measurement.trigger_capacity,
        }
    }

    /// `host:port` to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether an upgrade carrying `origin` is accepted.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|o| self.allowed_origins.iter().any(|allowed| allowed == o))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: None,
            send_queue_capacity: 256,
            heartbeat_interval: Duration::from_secs(30),
            allowed_origins: Vec::new(),
            server_id: None,
            measurement_period: None,
            trigger_capacity: 1,
        }
    }
}
