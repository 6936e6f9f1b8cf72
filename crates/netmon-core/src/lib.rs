//! # netmon-core
//!
//! Types shared by every netmon crate.
//!
//! - [`PerformanceRecord`]: one completed network measurement
//! - [`Notification`]: the `{type, data}` envelope sent to WebSocket clients
//! - [`TriggerSignal`]: "run one measurement now"

#![deny(unsafe_code)]

pub mod notification;
pub mod record;

pub use notification::{Notification, NotificationKind, REQUEST_MADE_STATUS, MEASUREMENT_FAILED_STATUS};
pub use record::{PerformanceRecord, ServerInfo};

/// Zero-payload request to run one measurement.
///
/// Manual (client message) and periodic triggers are indistinguishable once
/// they reach the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerSignal;
