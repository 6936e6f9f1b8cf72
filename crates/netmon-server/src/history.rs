//! In-memory measurement history.

use netmon_core::PerformanceRecord;
use parking_lot::RwLock;

/// Append-only, insertion-ordered list of completed measurements.
///
/// Only the request pipeline appends. The lock is never held across an
/// `.await`.
#[derive(Default)]
pub struct History {
    records: RwLock<Vec<PerformanceRecord>>,
}

impl History {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no measurement has completed yet.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every record, oldest first.
    pub fn snapshot(&self) -> Vec<PerformanceRecord> {
        self.records.read().clone()
    }

    /// Run `f` over the records while holding the read lock.
    ///
    /// Appends wait until `f` returns, so anything `f` does is ordered
    /// strictly before or after each append.
    pub(crate) fn with_records<T>(&self, f: impl FnOnce(&[PerformanceRecord]) -> T) -> T {
        let records = self.records.read();
        f(records.as_slice())
    }

    /// Append `record`, then run `f` on it before releasing the write lock.
    pub(crate) fn append_then<T>(
        &self,
        record: PerformanceRecord,
        f: impl FnOnce(&PerformanceRecord) -> T,
    ) -> T {
        let mut records = self.records.write();
        records.push(record);
        let last = records.len() - 1;
        f(&records[last])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PerformanceRecord {
        let mut r = PerformanceRecord::default();
        r.server.id = id.into();
        r
    }

    #[test]
    fn starts_empty() {
        let h = History::new();
        assert!(h.is_empty());
        assert_eq!(h.len(), 0);
        assert!(h.snapshot().is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let h = History::new();
        for id in ["1", "2", "3"] {
            h.append_then(record(id), |_| ());
        }
        let ids: Vec<_> = h.snapshot().into_iter().map(|r| r.server.id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn append_then_sees_new_record() {
        let h = History::new();
        h.append_then(record("a"), |_| ());
        let seen = h.append_then(record("b"), |r| r.server.id.clone());
        assert_eq!(seen, "b");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn append_waits_for_open_reader() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::mpsc;
        use std::time::Duration;

        let h = Arc::new(History::new());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let reader = {
            let h = Arc::clone(&h);
            std::thread::spawn(move || {
                h.with_records(|records| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    records.len()
                })
            })
        };
        entered_rx.recv().unwrap();

        let appended = Arc::new(AtomicBool::new(false));
        let writer = {
            let h = Arc::clone(&h);
            let appended = Arc::clone(&appended);
            std::thread::spawn(move || {
                h.append_then(record("a"), |_| appended.store(true, Ordering::SeqCst));
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!appended.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        // The reader saw the history as it was before the append.
        assert_eq!(reader.join().unwrap(), 0);
        writer.join().unwrap();
        assert!(appended.load(Ordering::SeqCst));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn with_records_borrows_current_state() {
        let h = History::new();
        h.append_then(record("a"), |_| ());
        let n = h.with_records(<[PerformanceRecord]>::len);
        assert_eq!(n, 1);
    }
}
