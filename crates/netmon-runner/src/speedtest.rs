//! `speedtest-cli` child-process runner.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use netmon_core::PerformanceRecord;
use tracing::{debug, info, instrument};

use crate::MeasurementRunner;
use crate::error::MeasurementError;

/// Default program name.
pub const DEFAULT_PROGRAM: &str = "speedtest-cli";

/// Runs `speedtest-cli --json [--server <id>]` and decodes its stdout.
///
/// There is no timeout: a tool that never exits stalls the caller until
/// the process is killed from outside. The pipeline accepts this and stays
/// single-flight rather than abandoning a running measurement.
#[derive(Clone, Debug)]
pub struct SpeedtestCli {
    program: String,
    args: Vec<String>,
}

impl SpeedtestCli {
    /// Runner for `program`, invoked with `--json`.
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_args(program, ["--json"])
    }

    /// Runner for `program` with explicit leading arguments. `--server <id>`
    /// is appended after them when a server is requested.
    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program that will be invoked.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, server_id: Option<u32>) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        let _ = cmd
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(id) = server_id {
            let _ = cmd.arg("--server").arg(id.to_string());
        }
        cmd
    }
}

impl Default for SpeedtestCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

#[async_trait]
impl MeasurementRunner for SpeedtestCli {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn run(&self, server_id: Option<u32>) -> Result<PerformanceRecord, MeasurementError> {
        let start = Instant::now();
        debug!(?server_id, "spawning measurement");

        let output = self
            .command(server_id)
            .output()
            .await
            .map_err(|source| MeasurementError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Output is decoded before the exit status is looked at.
        let record = parse_output(&output.stdout)?;

        if !output.status.success() {
            return Err(MeasurementError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            server_id = %record.server.id,
            server_name = %record.server.sponsor,
            location = %record.server.location,
            date = %record.timestamp,
            distance_km = record.server.distance_km,
            ping_ms = record.ping,
            download_mbps = record.download_mbps(),
            upload_mbps = record.upload_mbps(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "measurement complete"
        );
        Ok(record)
    }
}

/// Decode the first JSON document in `stdout`.
///
/// Whitespace-only output is [`MeasurementError::NoOutput`]; anything after
/// the first document is ignored.
pub fn parse_output(stdout: &[u8]) -> Result<PerformanceRecord, MeasurementError> {
    let mut docs = serde_json::Deserializer::from_slice(stdout).into_iter::<PerformanceRecord>();
    match docs.next() {
        None => Err(MeasurementError::NoOutput),
        Some(Ok(record)) => Ok(record),
        Some(Err(e)) => Err(MeasurementError::Decode(e)),
    }
}
