//! # netmon-runner
//!
//! The Measurement Runner: invokes the external speed test tool as a child
//! process and turns its stdout into a [`PerformanceRecord`].
//!
//! Retries are the caller's business; every failure is reported once as a
//! [`MeasurementError`].

#![deny(unsafe_code)]

pub mod error;
pub mod speedtest;

use async_trait::async_trait;
use netmon_core::PerformanceRecord;

pub use error::MeasurementError;
pub use speedtest::{SpeedtestCli, parse_output};

/// Something that can produce one measurement on demand.
///
/// The request pipeline is the only caller. Implementations must not assume
/// concurrent calls; the pipeline never overlaps them.
#[async_trait]
pub trait MeasurementRunner: Send + Sync {
    /// Run one measurement, targeting `server_id` if given, otherwise letting
    /// the tool choose a server.
    async fn run(&self, server_id: Option<u32>) -> Result<PerformanceRecord, MeasurementError>;
}
