//! The processor trait and interest-based record fan-out.

use pitwall_schemas::{DecodedRecord, RecordKind};
use tracing::trace;

/// A consumer of decoded records.
///
/// Processors run on the pipeline's consumer task only; `process` is
/// synchronous and must not block. A processor declares the record kinds it
/// wants and receives every matching record, in enqueue order.
pub trait Processor: Send {
    /// Record kinds this processor consumes.
    fn interests(&self) -> &'static [RecordKind];

    fn process(&mut self, record: &DecodedRecord);
}

/// Fans each decoded record out to every registered processor interested in
/// its kind. Several processors may consume the same kind.
#[derive(Default)]
pub struct Dispatcher {
    processors: Vec<Box<dyn Processor>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Deliver a record to its subscribers. Returns how many processors
    /// consumed it.
    pub fn dispatch(&mut self, record: &DecodedRecord) -> usize {
        let kind = record.kind();
        let mut delivered = 0;
        for processor in &mut self.processors {
            if processor.interests().contains(&kind) {
                processor.process(record);
                delivered += 1;
            }
        }
        if delivered == 0 {
            trace!(kind = %kind, "No processor registered for record kind");
        }
        delivered
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_schemas::TrackStatusDataPoint;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor {
        interests: &'static [RecordKind],
        seen: Arc<AtomicUsize>,
    }

    impl Processor for CountingProcessor {
        fn interests(&self) -> &'static [RecordKind] {
            self.interests
        }

        fn process(&mut self, _record: &DecodedRecord) {
            self.seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn track_status_record() -> DecodedRecord {
        DecodedRecord::TrackStatus(TrackStatusDataPoint::default())
    }

    #[test]
    fn test_fan_out_reaches_every_interested_processor() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let uninterested = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(CountingProcessor {
            interests: &[RecordKind::TrackStatus],
            seen: Arc::clone(&first),
        }));
        dispatcher.register(Box::new(CountingProcessor {
            interests: &[RecordKind::TrackStatus, RecordKind::LapCount],
            seen: Arc::clone(&second),
        }));
        dispatcher.register(Box::new(CountingProcessor {
            interests: &[RecordKind::WeatherData],
            seen: Arc::clone(&uninterested),
        }));

        let delivered = dispatcher.dispatch(&track_status_record());

        assert_eq!(delivered, 2);
        assert_eq!(first.load(Ordering::Relaxed), 1);
        assert_eq!(second.load(Ordering::Relaxed), 1);
        assert_eq!(uninterested.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_unclaimed_record_is_not_an_error() {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.dispatch(&track_status_record()), 0);
    }
}
