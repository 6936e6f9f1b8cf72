//! Single-flight request pipeline.
//!
//! One worker owns the measurement runner and is the only writer of the
//! history. Each trigger is processed end to end before the next one is
//! received:
//!
//! ```text
//! Idle -> Announcing -> Measuring -> Recording -> Idle
//!                           \-------(failure)----> Idle
//! ```

use std::sync::Arc;
use std::time::Instant;

use netmon_core::{MEASUREMENT_FAILED_STATUS, Notification, REQUEST_MADE_STATUS, TriggerSignal};
use netmon_runner::MeasurementRunner;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::history::History;
use crate::metrics::{MEASUREMENT_DURATION_SECONDS, MEASUREMENTS_TOTAL};
use crate::websocket::broadcast::Broadcaster;

/// Where the pipeline is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Waiting for a trigger.
    #[default]
    Idle,
    /// Broadcasting the "request made" status.
    Announcing,
    /// Waiting on the measurement runner.
    Measuring,
    /// Appending and broadcasting a new record.
    Recording,
}

impl PipelineState {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Announcing => "announcing",
            Self::Measuring => "measuring",
            Self::Recording => "recording",
        }
    }
}

/// How one trigger ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// A record was appended and its result broadcast.
    Recorded,
    /// A record was appended but could not be encoded for broadcast.
    Unbroadcast,
    /// The runner failed; history is unchanged.
    Failed,
}

impl RunOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::Unbroadcast => "encode_failed",
            Self::Failed => "failed",
        }
    }
}

/// The pipeline worker. Build one, then move it into [`RequestPipeline::run`].
pub struct RequestPipeline {
    runner: Arc<dyn MeasurementRunner>,
    server_id: Option<u32>,
    history: Arc<History>,
    broadcaster: Broadcaster,
    state: watch::Sender<PipelineState>,
}

impl RequestPipeline {
    /// Create an idle pipeline.
    pub fn new(
        runner: Arc<dyn MeasurementRunner>,
        server_id: Option<u32>,
        history: Arc<History>,
        broadcaster: Broadcaster,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            runner,
            server_id,
            history,
            broadcaster,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Process triggers until the channel closes or `shutdown` fires.
    ///
    /// Shutdown is only observed between runs; a measurement in progress is
    /// allowed to finish.
    pub async fn run(self, mut triggers: mpsc::Receiver<TriggerSignal>, shutdown: CancellationToken) {
        info!(server_id = ?self.server_id, "request pipeline started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                signal = triggers.recv() => match signal {
                    Some(TriggerSignal) => {
                        let _ = self.process().await;
                    }
                    None => break,
                },
            }
        }
        info!("request pipeline stopped");
    }

    /// Handle one trigger from announcement to the return to idle.
    pub async fn process(&self) -> RunOutcome {
        self.transition(PipelineState::Announcing);
        let _ = self.broadcaster.broadcast(&Notification::status(REQUEST_MADE_STATUS));

        self.transition(PipelineState::Measuring);
        let started = Instant::now();
        let result = self.runner.run(self.server_id).await;
        metrics::histogram!(MEASUREMENT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(record) => {
                self.transition(PipelineState::Recording);
                let broadcaster = &self.broadcaster;
                self.history.append_then(record, |record| match Notification::result(record) {
                    Ok(n) => {
                        let _ = broadcaster.broadcast(&n);
                        RunOutcome::Recorded
                    }
                    Err(e) => {
                        error!(error = %e, "failed to encode result, broadcast skipped");
                        RunOutcome::Unbroadcast
                    }
                })
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "measurement failed");
                let _ = self
                    .broadcaster
                    .broadcast(&Notification::status(MEASUREMENT_FAILED_STATUS));
                RunOutcome::Failed
            }
        };

        metrics::counter!(MEASUREMENTS_TOTAL, "outcome" => outcome.label()).increment(1);
        info!(outcome = outcome.label(), history_len = self.history.len(), "trigger processed");
        self.transition(PipelineState::Idle);
        outcome
    }

    fn transition(&self, next: PipelineState) {
        let _ = self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use crate::websocket::registry::SessionRegistry;
    use async_trait::async_trait;
    use netmon_core::{NotificationKind, PerformanceRecord};
    use netmon_runner::MeasurementError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Runner that replays a fixed script of results.
    struct ScriptedRunner {
        script: Mutex<VecDeque<Result<PerformanceRecord, MeasurementError>>>,
        calls: Mutex<Vec<Option<u32>>>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<Result<PerformanceRecord, MeasurementError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MeasurementRunner for ScriptedRunner {
        async fn run(&self, server_id: Option<u32>) -> Result<PerformanceRecord, MeasurementError> {
            self.calls.lock().push(server_id);
            self.script.lock().pop_front().unwrap_or(Err(MeasurementError::NoOutput))
        }
    }

    fn record(id: &str) -> PerformanceRecord {
        let mut r = PerformanceRecord::default();
        r.server.id = id.into();
        r
    }

    struct Harness {
        pipeline: RequestPipeline,
        history: Arc<History>,
        registry: Arc<SessionRegistry>,
        rx: mpsc::Receiver<Arc<String>>,
    }

    fn harness(runner: Arc<ScriptedRunner>, server_id: Option<u32>) -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let history = Arc::new(History::new());
        let (tx, rx) = mpsc::channel(16);
        registry.register(Arc::new(ClientConnection::new("c1".into(), tx)));
        let pipeline = RequestPipeline::new(
            runner,
            server_id,
            Arc::clone(&history),
            Broadcaster::new(Arc::clone(&registry)),
        );
        Harness {
            pipeline,
            history,
            registry,
            rx,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(json) = rx.try_recv() {
            out.push(Notification::from_json(&json).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn success_announces_then_records() {
        let runner = ScriptedRunner::new(vec![Ok(record("7"))]);
        let mut h = harness(runner.clone(), Some(7));

        assert_eq!(h.pipeline.process().await, RunOutcome::Recorded);

        let sent = drain(&mut h.rx);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Notification::status(REQUEST_MADE_STATUS));
        assert_eq!(sent[1].kind, NotificationKind::Result);
        assert_eq!(sent[1].record().unwrap().server.id, "7");
        assert_eq!(h.history.len(), 1);
        assert_eq!(*runner.calls.lock(), [Some(7)]);
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn failure_reports_fixed_status_and_keeps_history() {
        let runner = ScriptedRunner::new(vec![Err(MeasurementError::NoOutput)]);
        let mut h = harness(runner, None);

        assert_eq!(h.pipeline.process().await, RunOutcome::Failed);

        let sent = drain(&mut h.rx);
        assert_eq!(
            sent,
            [
                Notification::status(REQUEST_MADE_STATUS),
                Notification::status(MEASUREMENT_FAILED_STATUS),
            ]
        );
        assert!(h.history.is_empty());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn failure_text_hides_error_detail() {
        let runner = ScriptedRunner::new(vec![Err(MeasurementError::Exit {
            code: Some(1),
            stderr: "secret internals".into(),
        })]);
        let mut h = harness(runner, None);
        let _ = h.pipeline.process().await;
        let sent = drain(&mut h.rx);
        assert!(sent.iter().all(|n| !n.data.contains("secret")));
    }

    #[tokio::test]
    async fn records_accumulate_in_completion_order() {
        let runner = ScriptedRunner::new(vec![
            Ok(record("a")),
            Err(MeasurementError::NoOutput),
            Ok(record("b")),
        ]);
        let h = harness(runner, None);
        for _ in 0..3 {
            let _ = h.pipeline.process().await;
        }
        let ids: Vec<_> = h.history.snapshot().into_iter().map(|r| r.server.id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn visits_every_state_and_returns_to_idle() {
        let runner = ScriptedRunner::new(vec![Ok(record("1"))]);
        let h = harness(runner, None);
        let mut states = h.pipeline.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_task = Arc::clone(&seen);
        let watcher = tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let s = *states.borrow_and_update();
                seen_task.lock().push(s);
                if s == PipelineState::Idle {
                    break;
                }
            }
        });

        let _ = h.pipeline.process().await;
        watcher.await.unwrap();
        // The watcher may miss intermediate values but always sees the end.
        assert_eq!(seen.lock().last(), Some(&PipelineState::Idle));
    }

    #[tokio::test]
    async fn run_stops_when_triggers_close() {
        let runner = ScriptedRunner::new(vec![Ok(record("1"))]);
        let h = harness(runner, None);
        let history = Arc::clone(&h.history);
        let (tx, rx) = mpsc::channel(1);
        tx.send(TriggerSignal).await.unwrap();
        drop(tx);

        h.pipeline.run(rx, CancellationToken::new()).await;
        assert_eq!(history.len(), 1);
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let runner = ScriptedRunner::new(vec![]);
        let h = harness(runner, None);
        let (_tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        h.pipeline.run(rx, shutdown).await;
    }

    #[test]
    fn state_names() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
        assert_eq!(PipelineState::Measuring.as_str(), "measuring");
        assert_eq!(serde_json::to_value(PipelineState::Recording).unwrap(), "recording");
    }
}
