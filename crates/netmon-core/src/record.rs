//! Performance record as emitted by `speedtest-cli --json`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The remote server a measurement ran against.
///
/// Field names follow the measurement tool's JSON output. Missing fields
/// decode to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Server identifier (the tool reports it as a string).
    pub id: String,
    /// Sponsor / operator name.
    pub sponsor: String,
    /// Display name, usually the city.
    #[serde(rename = "name")]
    pub location: String,
    /// Country name.
    pub country: String,
    /// ISO country code.
    #[serde(rename = "cc")]
    pub country_code: String,
    /// Upload endpoint URL.
    pub url: String,
    /// `host:port` of the server.
    pub host: String,
    /// Longitude, as reported.
    #[serde(rename = "lon")]
    pub longitude: String,
    /// Latitude, as reported.
    #[serde(rename = "lat")]
    pub latitude: String,
    /// Distance to the server in km.
    #[serde(rename = "d")]
    pub distance_km: f64,
    /// Latency measured during server selection, in ms.
    #[serde(rename = "latency")]
    pub latency_ms: f64,
    /// Share URL, `null` unless the tool was asked to produce one.
    pub share: Option<String>,
}

/// One completed measurement. Immutable once produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceRecord {
    /// Server the measurement targeted.
    pub server: ServerInfo,
    /// Bytes sent during the upload phase.
    pub bytes_sent: f64,
    /// Bytes received during the download phase.
    pub bytes_received: f64,
    /// Upload throughput in bits/sec.
    pub upload: f64,
    /// Download throughput in bits/sec.
    pub download: f64,
    /// Measurement timestamp (ISO 8601, as reported by the tool).
    pub timestamp: String,
    /// Ping latency in ms.
    pub ping: f64,
}

impl PerformanceRecord {
    /// Download throughput in Mb/s.
    pub fn download_mbps(&self) -> f64 {
        self.download / 1e6
    }

    /// Upload throughput in Mb/s.
    pub fn upload_mbps(&self) -> f64 {
        self.upload / 1e6
    }
}

impl fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---")?;
        writeln!(f, "ServerID: {}", self.server.id)?;
        writeln!(f, "ServerName: {}", self.server.sponsor)?;
        writeln!(f, "Location: {}", self.server.location)?;
        writeln!(f, "Date: {}", self.timestamp)?;
        writeln!(f, "Distance: {:.2} km", self.server.distance_km)?;
        writeln!(f, "PingLatency: {:.2} ms", self.ping)?;
        writeln!(f, "DownloadRate: {:.2} Mb/s", self.download_mbps())?;
        write!(f, "UploadRate: {:.2} Mb/s", self.upload_mbps())
    }
}
