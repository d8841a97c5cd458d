use crate::record::AccessRecord;
use crate::AccessLogSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// A bounded-channel sink with capacity `depth`: `submit` never blocks —
/// on a full channel it drops the record and increments an atomic
/// counter rather than making the caller wait.
pub struct BoundedChannelSink {
    sender: mpsc::Sender<AccessRecord>,
    dropped: Arc<AtomicU64>,
}

impl BoundedChannelSink {
    /// Returns the sink plus the receiving half; the caller spawns a task
    /// draining the receiver into wherever access records should end up
    /// (another sink, a file, a message bus).
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<AccessRecord>) {
        let (sender, receiver) = mpsc::channel(depth);
        (
            BoundedChannelSink {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        )
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AccessLogSink for BoundedChannelSink {
    fn submit(&self, record: AccessRecord) {
        if self.sender.try_send(record).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(total_dropped = total, "access log channel full, dropping record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AccessRecord;
    use chrono::Utc;

    fn record(sub: &str) -> AccessRecord {
        AccessRecord {
            ts: Utc::now(),
            principal_sub: sub.into(),
            operation: "api:x".into(),
            resource: "doc:1".into(),
            allow: true,
            policies: vec![],
        }
    }

    #[tokio::test]
    async fn drops_and_counts_once_full() {
        let (sink, mut rx) = BoundedChannelSink::new(1);
        sink.submit(record("a"));
        sink.submit(record("b")); // channel full, dropped
        sink.submit(record("c")); // still full, dropped

        assert_eq!(sink.dropped_count(), 2);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.principal_sub, "a");
    }

    #[tokio::test]
    async fn submit_never_blocks_the_caller() {
        let (sink, _rx) = BoundedChannelSink::new(0);
        // Capacity 0: every submit drops immediately, but must return.
        sink.submit(record("a"));
        sink.submit(record("b"));
        assert_eq!(sink.dropped_count(), 2);
    }
}
