//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::pipeline::PipelineState;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Records held in memory.
    pub history_len: usize,
    /// What the request pipeline is doing.
    pub pipeline_state: PipelineState,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
    connections: usize,
    history_len: usize,
    pipeline_state: PipelineState,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        started_at: started_at.to_rfc3339(),
        connections,
        history_len,
        pipeline_state,
    }
}
