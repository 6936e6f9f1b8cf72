//! Measurement failure taxonomy.

use thiserror::Error;

/// Why a measurement produced no record.
#[derive(Debug, Error)]
pub enum MeasurementError {
    /// The process could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that was invoked.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The process produced nothing on stdout. The tool does this on
    /// transient network failures.
    #[error("no output provided from test")]
    NoOutput,
    /// Stdout was not a valid record document.
    #[error("failed to decode test output: {0}")]
    Decode(#[from] serde_json::Error),
    /// The process exited unsuccessfully after its output was read.
    #[error("test exited with status {code:?}: {stderr}")]
    Exit {
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

impl MeasurementError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch_failure",
            Self::NoOutput => "no_output",
            Self::Decode(_) => "decode_failure",
            Self::Exit { .. } => "exit_failure",
        }
    }
}
