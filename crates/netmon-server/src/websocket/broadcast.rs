//! Notification fan-out to connected WebSocket clients.

use std::sync::Arc;

use netmon_core::Notification;
use tracing::{debug, warn};

use super::registry::{SessionRegistry, Sweep};

/// Encodes a notification once and queues it for every live connection.
///
/// A connection whose queue rejects the frame (closed or full) is evicted
/// during the same pass. Encoding failures skip the broadcast entirely.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    /// Fan-out over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `notification` to every live connection.
    ///
    /// Returns `None` if the notification could not be encoded.
    pub fn broadcast(&self, notification: &Notification) -> Option<Sweep> {
        let json = match notification.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind = notification.kind.as_str(), error = %e, "failed to encode notification");
                return None;
            }
        };
        let sweep = self.registry.sweep(|conn| conn.send(Arc::clone(&json)));
        debug!(
            kind = notification.kind.as_str(),
            delivered = sweep.delivered,
            evicted = sweep.evicted,
            "broadcast notification"
        );
        Some(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use tokio::sync::mpsc;

    fn setup() -> (Broadcaster, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        (Broadcaster::new(Arc::clone(&registry)), registry)
    }

    fn add(
        registry: &SessionRegistry,
        id: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = Arc::new(ClientConnection::new(id.into(), tx));
        registry.register(Arc::clone(&conn));
        (conn, rx)
    }

    #[tokio::test]
    async fn delivers_to_all_live() {
        let (bc, reg) = setup();
        let (_a, mut ra) = add(&reg, "a", 4);
        let (_b, mut rb) = add(&reg, "b", 4);

        let sweep = bc.broadcast(&Notification::status("hi")).unwrap();
        assert_eq!(sweep, Sweep { delivered: 2, evicted: 0 });

        let expected = r#"{"type":"status","data":"hi"}"#;
        assert_eq!(*ra.recv().await.unwrap(), expected);
        assert_eq!(*rb.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn closed_receiver_is_evicted() {
        let (bc, reg) = setup();
        let (_a, mut ra) = add(&reg, "a", 4);
        let (b, rb) = add(&reg, "b", 4);
        drop(rb);

        let sweep = bc.broadcast(&Notification::status("x")).unwrap();
        assert_eq!(sweep, Sweep { delivered: 1, evicted: 1 });
        assert_eq!(reg.len(), 1);
        assert!(b.is_closed());
        assert!(ra.recv().await.is_some());
    }

    #[test]
    fn full_queue_is_evicted() {
        let (bc, reg) = setup();
        let (_a, _ra) = add(&reg, "a", 1);
        let _ = bc.broadcast(&Notification::status("1"));
        let sweep = bc.broadcast(&Notification::status("2")).unwrap();
        assert_eq!(sweep, Sweep { delivered: 0, evicted: 1 });
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn dead_entry_skipped_and_removed() {
        let (bc, reg) = setup();
        let (_a, mut ra) = add(&reg, "a", 4);
        reg.mark_dead("a");

        let sweep = bc.broadcast(&Notification::status("x")).unwrap();
        assert_eq!(sweep, Sweep { delivered: 0, evicted: 1 });
        assert!(ra.try_recv().is_err());
    }

    #[test]
    fn empty_registry_is_noop() {
        let (bc, _reg) = setup();
        assert_eq!(bc.broadcast(&Notification::status("x")), Some(Sweep::default()));
    }
}
