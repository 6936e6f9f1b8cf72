//! Server → client notification envelope.
//!
//! Every message the server writes to a WebSocket is a [`Notification`]
//! serialized as `{"type": "status"|"init"|"result", "data": "<string>"}`.
//! `data` is itself a JSON document for `init` (array of records) and
//! `result` (one record), and free text for `status`.

use serde::{Deserialize, Serialize};

use crate::record::PerformanceRecord;

/// Status text broadcast when a trigger is picked up.
pub const REQUEST_MADE_STATUS: &str = "Request made. Waiting for response.";

/// Status text broadcast when a measurement fails, whatever the cause.
pub const MEASUREMENT_FAILED_STATUS: &str = "Error executing SpeedTest.";

/// Notification discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Free-text progress or failure message.
    Status,
    /// Full history, sent once per connection.
    Init,
    /// One freshly completed record.
    Result,
}

impl NotificationKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Init => "init",
            Self::Result => "result",
        }
    }
}

/// Tagged envelope sent to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What `data` contains.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Kind-dependent payload.
    pub data: String,
}

impl Notification {
    /// A free-text status notification.
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Status,
            data: text.into(),
        }
    }

    /// An init notification carrying the whole history.
    ///
    /// An empty history encodes as `[]`, never `null`.
    pub fn init(history: &[PerformanceRecord]) -> serde_json::Result<Self> {
        Ok(Self {
            kind: NotificationKind::Init,
            data: serde_json::to_string(history)?,
        })
    }

    /// A result notification carrying one record.
    pub fn result(record: &PerformanceRecord) -> serde_json::Result<Self> {
        Ok(Self {
            kind: NotificationKind::Result,
            data: serde_json::to_string(record)?,
        })
    }

    /// Serialize the envelope for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse an envelope received from the wire.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Decode the payload of an `init` notification.
    pub fn history(&self) -> serde_json::Result<Vec<PerformanceRecord>> {
        serde_json::from_str(&self.data)
    }

    /// Decode the payload of a `result` notification.
    pub fn record(&self) -> serde_json::Result<PerformanceRecord> {
        serde_json::from_str(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PerformanceRecord {
        let mut r = PerformanceRecord::default();
        r.server.id = id.into();
        r.ping = 10.0;
        r
    }

    #[test]
    fn status_envelope_shape() {
        let json = Notification::status(REQUEST_MADE_STATUS).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["data"], "Request made. Waiting for response.");
    }

    #[test]
    fn empty_init_is_empty_array() {
        let n = Notification::init(&[]).unwrap();
        assert_eq!(n.kind, NotificationKind::Init);
        assert_eq!(n.data, "[]");
        assert!(n.history().unwrap().is_empty());
    }

    #[test]
    fn init_preserves_order() {
        let n = Notification::init(&[record("1"), record("2"), record("3")]).unwrap();
        let ids: Vec<String> = n.history().unwrap().into_iter().map(|r| r.server.id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn result_data_is_encoded_record() {
        let n = Notification::result(&record("42")).unwrap();
        let json = n.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "result");
        assert!(value["data"].is_string());
        assert_eq!(n.record().unwrap().server.id, "42");
    }

    #[test]
    fn parses_envelope_from_wire() {
        let n = Notification::from_json(r#"{"type":"status","data":"hi"}"#).unwrap();
        assert_eq!(n, Notification::status("hi"));
        assert!(Notification::from_json(r#"{"type":"bogus","data":""}"#).is_err());
    }

    #[test]
    fn kind_names() {
        assert_eq!(NotificationKind::Status.as_str(), "status");
        assert_eq!(NotificationKind::Init.as_str(), "init");
        assert_eq!(NotificationKind::Result.as_str(), "result");
    }
}
