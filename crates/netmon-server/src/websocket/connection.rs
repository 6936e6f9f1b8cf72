//! WebSocket client connection state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected WebSocket client, as seen by the registry and fan-out.
///
/// Outbound frames go through a bounded queue drained by the session's
/// writer task. Cancelling [`ClientConnection::close`] stops that task.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Fires when the connection should be torn down.
    closed: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            closed: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// Generate a fresh connection ID.
    pub fn next_id() -> String {
        format!("conn_{}", uuid::Uuid::now_v7())
    }

    /// Queue a text frame for the client.
    ///
    /// Returns `false` if the connection is closed or its queue is full.
    pub fn send(&self, message: Arc<String>) -> bool {
        !self.closed.is_cancelled() && self.tx.try_send(message).is_ok()
    }

    /// Signal the writer task to stop. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Token cancelled once the connection is closed.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new("conn_1".into(), tx), rx)
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = ClientConnection::next_id();
        let b = ClientConnection::next_id();
        assert!(a.starts_with("conn_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn send_delivers() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_fails_when_full() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
    }

    #[test]
    fn send_fails_when_receiver_dropped() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send(Arc::new("a".into())));
    }

    #[test]
    fn send_fails_after_close() {
        let (conn, _rx) = make_connection(4);
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(conn.closed().is_cancelled());
        assert!(!conn.send(Arc::new("a".into())));
    }

    #[test]
    fn age_is_small_on_creation() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.age() < Duration::from_secs(1));
    }
}
