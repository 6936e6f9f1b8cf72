//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use netmon_core::Notification;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::registry::SessionRegistry;
use crate::history::History;
use crate::metrics::WS_CONNECTIONS_TOTAL;
use crate::trigger::{TriggerOutcome, TriggerSender};

/// Shortest ping interval the writer will use.
const MIN_HEARTBEAT: Duration = Duration::from_millis(100);

/// How long the writer gets to flush its Close frame once the session ends.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a session needs, fixed when the server is built.
#[derive(Clone)]
pub struct SessionContext {
    /// Live connections.
    pub registry: Arc<SessionRegistry>,
    /// Replayed to each new client.
    pub history: Arc<History>,
    /// Inbound messages become triggers here.
    pub triggers: TriggerSender,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Interval between Ping frames.
    pub heartbeat_interval: Duration,
    /// Server-wide shutdown.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Queues an `init` notification with the full history, then registers
///    the connection so every later `result` arrives after it
/// 2. Treats every inbound Text or Binary frame as a manual trigger
/// 3. Forwards queued notifications and periodic Pings to the socket
/// 4. On any read or write failure, marks the connection dead and returns;
///    the registry entry is removed by the next broadcast
/// 5. Unless the transport already failed, ends with a Close frame: the reply
///    to a client close, or `1001 Going Away` on shutdown
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(ws: WebSocket, conn_id: String, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    let closed = connection.closed();

    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    // Holding the history read lock keeps the pipeline from appending (and
    // broadcasting) between the snapshot and the registration.
    let history_len = ctx.history.with_records(|records| {
        match Notification::init(records).and_then(|n| n.to_json()) {
            Ok(json) => {
                if !connection.send(Arc::new(json)) {
                    warn!("failed to enqueue init notification");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode init notification, skipped"),
        }
        ctx.registry.register(Arc::clone(&connection));
        records.len()
    });
    info!(history_len, "client connected");

    let writer_conn = Arc::clone(&connection);
    let writer_registry = Arc::clone(&ctx.registry);
    let heartbeat = ctx.heartbeat_interval.max(MIN_HEARTBEAT);
    let writer_closed = closed.clone();
    let writer_shutdown = ctx.shutdown.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            let frame = tokio::select! {
                () = writer_closed.cancelled() => break,
                msg = send_rx.recv() => match msg {
                    Some(text) => Message::Text(text.as_str().into()),
                    None => break,
                },
                _ = ping_interval.tick() => Message::Ping(Vec::new().into()),
            };
            if let Err(e) = ws_tx.send(frame).await {
                debug!(error = %e, "write failed");
                writer_registry.mark_dead(&writer_conn.id);
                writer_conn.close();
                return;
            }
        }

        // After a client close this flushes the queued reply; otherwise it
        // starts the handshake from our side.
        let frame = if writer_shutdown.is_cancelled() {
            CloseFrame {
                code: close_code::AWAY,
                reason: "server shutting down".into(),
            }
        } else {
            CloseFrame {
                code: close_code::NORMAL,
                reason: "".into(),
            }
        };
        if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "close frame not sent");
        }
        let _ = ws_tx.close().await;
    });

    loop {
        // An evicted or shutting-down session stops reading first.
        let frame = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            () = ctx.shutdown.cancelled() => break,
            frame = ws_rx.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(_) | Message::Binary(_))) => match ctx.triggers.fire() {
                TriggerOutcome::Queued => debug!("manual trigger queued"),
                TriggerOutcome::Coalesced => debug!("manual trigger coalesced"),
                TriggerOutcome::Closed => warn!("manual trigger dropped, pipeline stopped"),
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                info!("client sent close frame");
                break;
            }
            Some(Err(e)) => {
                debug!(error = %e, "read failed");
                break;
            }
            None => break,
        }
    }

    ctx.registry.mark_dead(&conn_id);
    connection.close();
    if tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
        debug!("close handshake timed out");
        writer.abort();
    }
    info!(age_secs = connection.age().as_secs(), "client disconnected");
}
