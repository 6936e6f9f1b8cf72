//! Registry of live WebSocket connections.
//!
//! Every access goes through one mutex. Sessions only ever flag their own
//! entry as dead; entries are removed exclusively by the fan-out sweep
//! ([`SessionRegistry::sweep`]), which is `pub(crate)` and only called by
//! [`super::broadcast::Broadcaster`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::connection::ClientConnection;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_EVICTIONS_TOTAL};

struct Entry {
    conn: Arc<ClientConnection>,
    live: bool,
}

/// Result of one fan-out sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Connections removed during the sweep.
    pub evicted: usize,
}

/// Set of connections eligible to receive broadcasts.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection as live.
    pub fn register(&self, conn: Arc<ClientConnection>) {
        let mut entries = self.entries.lock();
        let id = conn.id.clone();
        let _ = entries.insert(id.clone(), Entry { conn, live: true });
        gauge(entries.len());
        debug!(conn_id = %id, total = entries.len(), "connection registered");
    }

    /// Flag a connection as no longer live.
    ///
    /// The entry stays in the registry until the next fan-out sweeps it.
    /// Unknown IDs are ignored.
    pub fn mark_dead(&self, id: &str) {
        if let Some(entry) = self.entries.lock().get_mut(id) {
            entry.live = false;
        }
    }

    /// Whether `id` is registered and live.
    pub fn is_live(&self, id: &str) -> bool {
        self.entries.lock().get(id).is_some_and(|e| e.live)
    }

    /// Entries currently held, live or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of live entries.
    pub fn live_count(&self) -> usize {
        self.entries.lock().values().filter(|e| e.live).count()
    }

    /// Offer every live connection to `deliver`, holding the lock for the
    /// whole pass.
    ///
    /// Entries already flagged dead, and entries for which `deliver` returns
    /// `false`, are removed and their connection closed.
    pub(crate) fn sweep(&self, mut deliver: impl FnMut(&ClientConnection) -> bool) -> Sweep {
        let mut entries = self.entries.lock();
        let mut sweep = Sweep::default();
        entries.retain(|id, entry| {
            let reason = if !entry.live {
                "dead"
            } else if deliver(entry.conn.as_ref()) {
                sweep.delivered += 1;
                return true;
            } else {
                "send_failed"
            };
            entry.conn.close();
            sweep.evicted += 1;
            metrics::counter!(WS_EVICTIONS_TOTAL, "reason" => reason).increment(1);
            info!(conn_id = %id, reason, age_secs = entry.conn.age().as_secs(), "connection evicted");
            false
        });
        gauge(entries.len());
        sweep
    }
}

#[allow(clippy::cast_precision_loss)]
fn gauge(len: usize) {
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).set(len as f64);
}
