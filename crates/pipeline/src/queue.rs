//! The ingestion queue between feed readers and the replay consumer.
//!
//! Unbounded by design: the producer must never block or lose a record, so
//! backpressure is traded for observable depth. A consumer that cannot keep
//! up grows the queue without bound; that risk is surfaced through [`len`]
//! and the pipeline's lag warning rather than masked by dropping.
//!
//! [`len`]: IngestionQueue::len

use pitwall_schemas::RawRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Producer handle to the ingestion queue. Cloneable; all clones feed the
/// same consumer in arrival order.
#[derive(Debug, Clone)]
pub struct IngestionQueue {
    tx: mpsc::UnboundedSender<RawRecord>,
    depth: Arc<AtomicUsize>,
}

impl IngestionQueue {
    /// Enqueue a record. Never blocks and never rejects; a record offered
    /// after the consumer is gone is dropped with a debug log, since the
    /// producer outliving a stopped pipeline is an orderly shutdown path.
    pub fn enqueue(&self, record: RawRecord) {
        self.depth.fetch_add(1, Ordering::Relaxed);
        if let Err(error) = self.tx.send(record) {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            debug!(kind = %error.0.kind, "Dropping record enqueued after consumer shutdown");
        }
    }

    /// Current queue depth, for diagnostics.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer half. One per pipeline run; FIFO with the producer handles.
pub(crate) struct RecordReceiver {
    rx: mpsc::UnboundedReceiver<RawRecord>,
    depth: Arc<AtomicUsize>,
}

impl RecordReceiver {
    /// Await the next record. `None` once every producer handle is dropped
    /// and the queue is drained.
    pub(crate) async fn recv(&mut self) -> Option<RawRecord> {
        let record = self.rx.recv().await;
        if record.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        record
    }

    pub(crate) fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Create a fresh queue/consumer pair. Each pipeline start gets its own.
pub(crate) fn channel() -> (IngestionQueue, RecordReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        IngestionQueue {
            tx,
            depth: Arc::clone(&depth),
        },
        RecordReceiver { rx, depth },
    )
}
