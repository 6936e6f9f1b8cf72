//! Trigger channel and the periodic trigger.
//!
//! Triggers reach the pipeline through a bounded channel. Senders never
//! wait: when the buffer is full a trigger is coalesced into the one
//! already pending, so a burst of requests during a measurement yields at
//! most `capacity` follow-up runs.

use std::time::Duration;

use netmon_core::TriggerSignal;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::TRIGGERS_COALESCED_TOTAL;

/// What happened to a fired trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Buffered for the pipeline.
    Queued,
    /// Buffer full; merged with a pending trigger.
    Coalesced,
    /// The pipeline has stopped.
    Closed,
}

/// Cloneable, non-blocking handle for requesting a measurement.
#[derive(Clone, Debug)]
pub struct TriggerSender {
    tx: mpsc::Sender<TriggerSignal>,
}

/// Create a trigger channel buffering up to `capacity` pending triggers
/// (at least one).
pub fn trigger_channel(capacity: usize) -> (TriggerSender, mpsc::Receiver<TriggerSignal>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TriggerSender { tx }, rx)
}

impl TriggerSender {
    /// Request a measurement without waiting.
    pub fn fire(&self) -> TriggerOutcome {
        match self.tx.try_send(TriggerSignal) {
            Ok(()) => TriggerOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                metrics::counter!(TRIGGERS_COALESCED_TOTAL).increment(1);
                debug!("trigger coalesced with pending request");
                TriggerOutcome::Coalesced
            }
            Err(TrySendError::Closed(_)) => TriggerOutcome::Closed,
        }
    }

    /// Whether the receiving pipeline has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fire a trigger, sleep `period`, repeat.
///
/// The first trigger fires immediately. Missed ticks are not caught up:
/// each sleep starts after the previous fire. Returns on `shutdown` or once
/// the pipeline is gone.
pub async fn run_periodic_trigger(
    triggers: TriggerSender,
    period: Duration,
    shutdown: CancellationToken,
) {
    info!(period_secs = period.as_secs(), "periodic trigger started");
    loop {
        let outcome = triggers.fire();
        debug!(?outcome, "periodic trigger fired");
        if outcome == TriggerOutcome::Closed {
            break;
        }
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }
    }
    info!("periodic trigger stopped");
}
