//! The temporally paced replay consumer.
//!
//! Records carry the source's own emission timestamps. The consumer shifts
//! each timestamp by a fixed clock offset (derived once from the stream's
//! first heartbeat) and suspends until the shifted instant before handing
//! the record on, reproducing the original inter-record spacing. Records
//! already behind wall clock are processed immediately - catching up never
//! adds delay and never batches.

use crate::error::PipelineError;
use crate::queue::{self, IngestionQueue, RecordReceiver};
use chrono::{TimeDelta, Utc};
use pitwall_processing::{Dispatcher, Published};
use pitwall_schemas::{DecodeError, DecodedRecord, RawRecord, RecordKind};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// How many processed records the trailing diagnostic buffer retains.
pub const RECENT_RECORDS: usize = 5;

/// The fixed offset applied to record timestamps during replay.
///
/// Computed once at stream start as `process_now - first_heartbeat_utc` and
/// shared between the feed reader (which sets it) and the consumer (which
/// reads it per record). Stored at millisecond precision, matching the
/// feed's own timestamps.
#[derive(Debug, Default)]
pub struct ClockOffset(AtomicI64);

impl ClockOffset {
    pub fn set(&self, offset: TimeDelta) {
        self.0.store(offset.num_milliseconds(), Ordering::Relaxed);
    }

    pub fn get(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.0.load(Ordering::Relaxed))
    }
}

/// The ingestion pipeline: queue, paced consumer, and processor fan-out.
///
/// Exactly one consumer task runs per started pipeline; it is the sole
/// writer of all processor state. Restarting after [`stop`] builds a fresh
/// queue/consumer pair; starting while running is refused loudly.
///
/// [`stop`]: ReplayPipeline::stop
pub struct ReplayPipeline {
    dispatcher: Option<Dispatcher>,
    offset: Arc<ClockOffset>,
    recent: Published<Vec<RawRecord>>,
    depth_warn_threshold: usize,
    running: Option<RunningConsumer>,
}

struct RunningConsumer {
    queue: IngestionQueue,
    shutdown: watch::Sender<bool>,
    consumer: JoinHandle<Dispatcher>,
}

impl ReplayPipeline {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            offset: Arc::new(ClockOffset::default()),
            recent: Published::default(),
            depth_warn_threshold: 500,
            running: None,
        }
    }

    /// Queue depth above which the consumer warns that it is lagging.
    #[must_use]
    pub fn with_depth_warn_threshold(mut self, threshold: usize) -> Self {
        self.depth_warn_threshold = threshold;
        self
    }

    /// The shared clock offset cell.
    pub fn clock_offset(&self) -> Arc<ClockOffset> {
        Arc::clone(&self.offset)
    }

    /// Read handle over the trailing diagnostic buffer of processed records.
    pub fn recent_records(&self) -> Published<Vec<RawRecord>> {
        self.recent.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Producer handle of the current run, if started.
    pub fn queue(&self) -> Option<IngestionQueue> {
        self.running.as_ref().map(|running| running.queue.clone())
    }

    /// Start the consumer on a fresh queue and return the producer handle.
    ///
    /// # Errors
    ///
    /// [`PipelineError::AlreadyRunning`] when a consumer is active - two
    /// consumers would race on the same state, so this is refused rather
    /// than tolerated. [`PipelineError::ConsumerLost`] when a previous run's
    /// consumer died abnormally and took the processors with it.
    pub fn start(&mut self) -> Result<IngestionQueue, PipelineError> {
        if self.running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let dispatcher = self
            .dispatcher
            .take()
            .ok_or_else(|| PipelineError::ConsumerLost("processors unavailable".to_string()))?;

        let (queue, receiver) = queue::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = tokio::spawn(run_consumer(
            dispatcher,
            receiver,
            Arc::clone(&self.offset),
            self.recent.clone(),
            shutdown_rx,
            self.depth_warn_threshold,
        ));

        info!("Replay pipeline started");
        self.running = Some(RunningConsumer {
            queue: queue.clone(),
            shutdown: shutdown_tx,
            consumer,
        });
        Ok(queue)
    }

    /// Stop the consumer, aborting any in-progress pacing wait. Idempotent;
    /// stopping a pipeline that is not running is a no-op.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ConsumerLost`] when the consumer task panicked; the
    /// pipeline cannot be restarted afterwards.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.shutdown.send(true);
        match running.consumer.await {
            Ok(dispatcher) => {
                self.dispatcher = Some(dispatcher);
                info!("Replay pipeline stopped");
                Ok(())
            }
            Err(error) => Err(PipelineError::ConsumerLost(error.to_string())),
        }
    }
}

async fn run_consumer(
    mut dispatcher: Dispatcher,
    mut receiver: RecordReceiver,
    offset: Arc<ClockOffset>,
    recent: Published<Vec<RawRecord>>,
    mut shutdown: watch::Receiver<bool>,
    depth_warn_threshold: usize,
) -> Dispatcher {
    let mut recent_buffer: VecDeque<RawRecord> = VecDeque::with_capacity(RECENT_RECORDS + 1);
    let mut lag_warned = false;

    loop {
        let record = tokio::select! {
            _ = shutdown.changed() => break,
            record = receiver.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        let depth = receiver.len();
        if depth >= depth_warn_threshold {
            if !lag_warned {
                warn!(
                    depth,
                    threshold = depth_warn_threshold,
                    "Ingestion queue is backing up; consumer is lagging the producer"
                );
                lag_warned = true;
            }
        } else {
            lag_warned = false;
        }

        recent_buffer.push_back(record.clone());
        if recent_buffer.len() > RECENT_RECORDS {
            recent_buffer.pop_front();
        }
        recent.publish(recent_buffer.iter().cloned().collect());

        if !pace(&record, &offset, &mut shutdown).await {
            break;
        }

        if let Err(error) = dispatch_record(&mut dispatcher, &record) {
            warn!(kind = %record.kind, error = %error, "Failed to process record");
        }
    }

    dispatcher
}

/// Suspend until the record's shifted emission instant. Returns `false` when
/// the wait was aborted by shutdown.
async fn pace(record: &RawRecord, offset: &ClockOffset, shutdown: &mut watch::Receiver<bool>) -> bool {
    let target = record.timestamp + offset.get();
    let now = Utc::now();
    if target <= now {
        return true;
    }
    let Ok(wait) = (target - now).to_std() else {
        return true;
    };

    debug!(kind = %record.kind, wait_ms = wait.as_millis() as u64, "Pacing record delivery");
    tokio::select! {
        _ = tokio::time::sleep(wait) => true,
        _ = shutdown.changed() => false,
    }
}

/// Resolve, decode, and fan out one record. Unknown tags and empty payloads
/// are skipped; a decode failure is returned for the caller to log.
fn dispatch_record(
    dispatcher: &mut Dispatcher,
    record: &RawRecord,
) -> Result<(), DecodeError> {
    let Some(kind) = RecordKind::from_tag(&record.kind) else {
        trace!(tag = %record.kind, "Ignoring untracked record kind");
        return Ok(());
    };
    let Some(payload) = record.payload.as_deref() else {
        trace!(kind = %kind, "Skipping record without payload");
        return Ok(());
    };

    let decoded = DecodedRecord::decode(kind, payload)?;
    dispatcher.dispatch(&decoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_processing::Processor;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Forwards the `Message` field of each track status record, stamped
    /// with the virtual instant it was dispatched at.
    struct ProbeProcessor {
        tx: mpsc::UnboundedSender<(String, tokio::time::Instant)>,
    }

    impl Processor for ProbeProcessor {
        fn interests(&self) -> &'static [RecordKind] {
            &[RecordKind::TrackStatus]
        }

        fn process(&mut self, record: &DecodedRecord) {
            if let DecodedRecord::TrackStatus(status) = record {
                let message = status.message.clone().unwrap_or_default();
                let _ = self.tx.send((message, tokio::time::Instant::now()));
            }
        }
    }

    fn probe_pipeline() -> (
        ReplayPipeline,
        mpsc::UnboundedReceiver<(String, tokio::time::Instant)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(ProbeProcessor { tx }));
        (ReplayPipeline::new(dispatcher), rx)
    }

    fn status_record(message: &str, timestamp: chrono::DateTime<Utc>) -> RawRecord {
        RawRecord::new(
            "TrackStatus",
            format!(r#"{{"Status": "1", "Message": "{message}"}}"#),
            timestamp,
        )
    }

    #[tokio::test]
    async fn test_records_dispatch_in_enqueue_order() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let queue = pipeline.start().unwrap();

        let past = Utc::now() - TimeDelta::seconds(10);
        for index in 0..10 {
            queue.enqueue(status_record(&format!("m{index}"), past));
        }

        for index in 0..10 {
            let (message, _) = rx.recv().await.unwrap();
            assert_eq!(message, format!("m{index}"));
        }
        pipeline.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_records_wait_for_their_instant() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let queue = pipeline.start().unwrap();

        let t0 = tokio::time::Instant::now();
        queue.enqueue(status_record("paced", Utc::now() + TimeDelta::milliseconds(500)));

        let (message, dispatched_at) = rx.recv().await.unwrap();
        assert_eq!(message, "paced");
        // Virtual time must have advanced by (close to) the pacing gap.
        assert!(dispatched_at.duration_since(t0) >= Duration::from_millis(400));

        pipeline.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_records_dispatch_without_added_delay() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let queue = pipeline.start().unwrap();

        let t0 = tokio::time::Instant::now();
        queue.enqueue(status_record("late", Utc::now() - TimeDelta::seconds(30)));

        let (message, dispatched_at) = rx.recv().await.unwrap();
        assert_eq!(message, "late");
        assert!(dispatched_at.duration_since(t0) < Duration::from_millis(50));

        pipeline.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_shifts_the_target_instant() {
        let (mut pipeline, mut rx) = probe_pipeline();
        pipeline.clock_offset().set(TimeDelta::milliseconds(800));
        let queue = pipeline.start().unwrap();

        let t0 = tokio::time::Instant::now();
        queue.enqueue(status_record("shifted", Utc::now()));

        let (_, dispatched_at) = rx.recv().await.unwrap();
        assert!(dispatched_at.duration_since(t0) >= Duration::from_millis(700));

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_aborts_pending_pacing_wait() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let queue = pipeline.start().unwrap();

        queue.enqueue(status_record("never", Utc::now() + TimeDelta::seconds(3600)));
        // Give the consumer a beat to enter the pacing sleep.
        tokio::time::sleep(Duration::from_millis(50)).await;

        pipeline.stop().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reentrant_start_fails_loudly() {
        let (mut pipeline, _rx) = probe_pipeline();
        let _queue = pipeline.start().unwrap();

        assert!(matches!(
            pipeline.start(),
            Err(PipelineError::AlreadyRunning)
        ));
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_uses_a_fresh_queue() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let first_queue = pipeline.start().unwrap();
        pipeline.stop().await.unwrap();

        let second_queue = pipeline.start().unwrap();
        // The old handle feeds a dead consumer; the new one works.
        first_queue.enqueue(status_record("stale", Utc::now() - TimeDelta::seconds(1)));
        second_queue.enqueue(status_record("fresh", Utc::now() - TimeDelta::seconds(1)));

        let (message, _) = rx.recv().await.unwrap();
        assert_eq!(message, "fresh");
        pipeline.stop().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_records_do_not_stall_the_stream() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let queue = pipeline.start().unwrap();
        let past = Utc::now() - TimeDelta::seconds(1);

        queue.enqueue(RawRecord::new("TimingData", "{broken json", past));
        queue.enqueue(RawRecord::new("CarData.z", "opaque", past));
        queue.enqueue(RawRecord {
            kind: "TrackStatus".to_string(),
            payload: None,
            timestamp: past,
        });
        queue.enqueue(status_record("alive", past));

        let (message, _) = rx.recv().await.unwrap();
        assert_eq!(message, "alive");
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_trailing_buffer_keeps_last_five() {
        let (mut pipeline, mut rx) = probe_pipeline();
        let recent = pipeline.recent_records();
        let queue = pipeline.start().unwrap();
        let past = Utc::now() - TimeDelta::seconds(1);

        for index in 0..7 {
            queue.enqueue(status_record(&format!("m{index}"), past));
        }
        for _ in 0..7 {
            rx.recv().await.unwrap();
        }

        let buffer = recent.get();
        assert_eq!(buffer.len(), RECENT_RECORDS);
        let first = buffer.first().unwrap();
        let last = buffer.last().unwrap();
        assert!(first.payload.as_deref().unwrap_or_default().contains("m2"));
        assert!(last.payload.as_deref().unwrap_or_default().contains("m6"));

        pipeline.stop().await.unwrap();
    }
}
