//! The per-driver timing merger.
//!
//! `TimingData` records carry sparse per-driver updates. This processor folds
//! them into a single mutable latest view per driver, materializes a deep
//! copy of that view into the current lap's history slot after every merge,
//! and freezes a lap's slot forever once a newer lap number supersedes it.
//! History entries are `Arc`ed deep copies and never alias the live state.

use crate::best::{BestLap, BestLapTracker};
use crate::processor::Processor;
use crate::publish::Published;
use pitwall_schemas::{DecodedRecord, DriverTiming, RecordKind, TimingDataPoint};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Frozen lap snapshots per driver, keyed by lap number.
pub type LapHistory = HashMap<String, BTreeMap<u32, Arc<DriverTiming>>>;

/// A lap handed to persistence collaborators at the moment it was superseded.
#[derive(Debug, Clone)]
pub struct CompletedLap {
    pub driver_number: String,
    pub lap_number: u32,
    /// The frozen snapshot; shared with the history arena, never mutated.
    pub data: Arc<DriverTiming>,
}

/// Receiver for completed laps. Failures are contained: the processor logs
/// them and in-memory state is unaffected.
pub trait LapSink: Send {
    /// Called once per superseded lap, on the consumer task.
    ///
    /// # Errors
    ///
    /// Implementations report storage failures; the caller logs and
    /// continues.
    fn lap_completed(&mut self, lap: &CompletedLap) -> anyhow::Result<()>;
}

/// Read handle over the timing processor's published snapshots.
///
/// Cloneable and shareable with reader threads; loads never block the
/// consumer and the consumer never waits for readers.
#[derive(Debug, Clone, Default)]
pub struct TimingState {
    latest: Published<TimingDataPoint>,
    laps: Published<LapHistory>,
    best_laps: Published<HashMap<String, BestLap>>,
}

impl TimingState {
    /// The merged latest view across all drivers.
    pub fn latest(&self) -> Arc<TimingDataPoint> {
        self.latest.get()
    }

    /// A single driver's merged latest line.
    pub fn driver(&self, driver_number: &str) -> Option<DriverTiming> {
        self.latest.get().lines.get(driver_number).cloned()
    }

    /// The full frozen lap arena.
    pub fn lap_history(&self) -> Arc<LapHistory> {
        self.laps.get()
    }

    /// One frozen lap snapshot.
    pub fn lap(&self, driver_number: &str, lap_number: u32) -> Option<Arc<DriverTiming>> {
        self.laps
            .get()
            .get(driver_number)
            .and_then(|laps| laps.get(&lap_number))
            .cloned()
    }

    /// Best laps per driver.
    pub fn best_laps(&self) -> Arc<HashMap<String, BestLap>> {
        self.best_laps.get()
    }

    pub fn best_lap(&self, driver_number: &str) -> Option<BestLap> {
        self.best_laps.get().get(driver_number).cloned()
    }
}

/// Folds `TimingData` records into cumulative per-driver state.
///
/// Runs on the pipeline's consumer task; the scheduler serializes all
/// records, so `apply` needs no internal locking. Readers go through the
/// [`TimingState`] handle.
#[derive(Default)]
pub struct TimingProcessor {
    latest: TimingDataPoint,
    current_lap: HashMap<String, u32>,
    history: LapHistory,
    best: BestLapTracker,
    state: TimingState,
    sinks: Vec<Box<dyn LapSink>>,
}

impl TimingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a completed-lap sink (persistence collaborator).
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn LapSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Shareable read handle over the published snapshots.
    pub fn state(&self) -> TimingState {
        self.state.clone()
    }

    /// Fold one record's lines into the state and republish snapshots.
    pub fn apply(&mut self, data: &TimingDataPoint) {
        for (driver_number, update) in &data.lines {
            self.apply_line(driver_number, update);
        }
        self.state.latest.publish(self.latest.clone());
        self.state.laps.publish(self.history.clone());
        self.state.best_laps.publish(self.best.all().clone());
    }

    fn apply_line(&mut self, driver_number: &str, update: &DriverTiming) {
        let history = self.history.entry(driver_number.to_string()).or_default();
        let opened = update
            .number_of_laps
            .filter(|lap_number| !history.contains_key(lap_number));

        if let Some(lap_number) = opened {
            // A lap number we have not seen supersedes the current lap. The
            // superseded slot already holds its last materialized copy; it is
            // frozen from here on and handed to the sinks.
            if let Some(previous) = self.current_lap.get(driver_number).copied()
                && let Some(frozen) = history.get(&previous)
            {
                let completed = CompletedLap {
                    driver_number: driver_number.to_string(),
                    lap_number: previous,
                    data: Arc::clone(frozen),
                };
                for sink in &mut self.sinks {
                    if let Err(error) = sink.lap_completed(&completed) {
                        warn!(
                            driver = driver_number,
                            lap = previous,
                            error = %error,
                            "Lap sink failed; in-memory state is unaffected"
                        );
                    }
                }
            }

            debug!(driver = driver_number, lap = lap_number, "Opened new lap");
            self.latest
                .lines
                .insert(driver_number.to_string(), update.clone());
            history.insert(lap_number, Arc::new(update.clone()));
            self.current_lap
                .insert(driver_number.to_string(), lap_number);
            self.best.observe(driver_number, update);
        } else {
            // Continuation of the current lap: an absent lap number, or a
            // number already in history (a closed lap is never reopened).
            let line = self
                .latest
                .lines
                .entry(driver_number.to_string())
                .or_default();
            line.merge_from(update);
            if let Some(lap_number) = self.current_lap.get(driver_number).copied() {
                history.insert(lap_number, Arc::new(line.clone()));
            }
            self.best.observe(driver_number, line);
        }
    }
}

impl Processor for TimingProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::TimingData]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::TimingData(data) = record {
            self.apply(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_schemas::LapTime;
    use std::sync::Mutex;

    fn data_point(json: &str) -> TimingDataPoint {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_latest_is_last_writer_wins_per_field() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"Position": "3", "GapToLeader": "+2.000"}}}"#,
        ));
        processor.apply(&data_point(r#"{"Lines": {"44": {"GapToLeader": "+2.400"}}}"#));

        let line = processor.state().driver("44").unwrap();
        assert_eq!(line.position.as_deref(), Some("3"));
        assert_eq!(line.gap_to_leader.as_deref(), Some("+2.400"));
    }

    #[test]
    fn test_apply_is_idempotent_for_present_fields() {
        let update = data_point(
            r#"{"Lines": {"44": {"NumberOfLaps": 4, "LastLapTime": {"Value": "1:33.000"}}}}"#,
        );

        let mut once = TimingProcessor::new();
        once.apply(&update);
        let mut twice = TimingProcessor::new();
        twice.apply(&update);
        twice.apply(&update);

        assert_eq!(
            once.state().driver("44").unwrap(),
            twice.state().driver("44").unwrap()
        );
    }

    #[test]
    fn test_no_history_before_first_lap_number() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(r#"{"Lines": {"44": {"Position": "1"}}}"#));

        assert!(processor.state().lap_history().get("44").is_none_or(|laps| laps.is_empty()));
        assert!(processor.state().driver("44").is_some());
    }

    #[test]
    fn test_continuation_refreshes_open_lap_slot() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 7}}}"#));
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"Sectors": {"0": {"Value": "26.259"}}}}}"#,
        ));

        let slot = processor.state().lap("44", 7).unwrap();
        assert_eq!(
            slot.sectors.get(&0).and_then(|s| s.value.as_deref()),
            Some("26.259")
        );
    }

    #[test]
    fn test_superseded_lap_is_frozen() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"NumberOfLaps": 7, "LastLapTime": {"Value": "1:33.000"}}}}"#,
        ));
        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 8}}}"#));

        let frozen = processor.state().lap("44", 7).unwrap();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"LastLapTime": {"Value": "1:31.000"}}}}"#,
        ));

        // The frozen slot is untouched by merges into the current lap.
        let after = processor.state().lap("44", 7).unwrap();
        assert!(Arc::ptr_eq(&frozen, &after));
        assert_eq!(
            after.last_lap_time.as_ref().and_then(|t| t.value.as_deref()),
            Some("1:33.000")
        );
        assert_eq!(
            processor
                .state()
                .lap("44", 8)
                .unwrap()
                .last_lap_time
                .as_ref()
                .and_then(|t| t.value.as_deref()),
            Some("1:31.000")
        );
    }

    #[test]
    fn test_closed_lap_number_is_never_reopened() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"NumberOfLaps": 7, "Position": "1"}}}"#,
        ));
        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 8}}}"#));
        let frozen = processor.state().lap("44", 7).unwrap();

        // A stray update naming the closed lap merges as a continuation of
        // the current lap instead of reopening lap 7.
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"NumberOfLaps": 7, "Position": "2"}}}"#,
        ));

        assert!(Arc::ptr_eq(&frozen, &processor.state().lap("44", 7).unwrap()));
        assert_eq!(
            processor
                .state()
                .lap("44", 8)
                .unwrap()
                .position
                .as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_history_never_aliases_latest() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"NumberOfLaps": 7, "Position": "5"}}}"#,
        ));
        let slot_before = processor.state().lap("44", 7).unwrap();

        processor.apply(&data_point(r#"{"Lines": {"44": {"Position": "4"}}}"#));

        // The refresh installed a new deep copy; the copy a reader held is
        // unchanged.
        assert_eq!(slot_before.position.as_deref(), Some("5"));
        let slot_after = processor.state().lap("44", 7).unwrap();
        assert!(!Arc::ptr_eq(&slot_before, &slot_after));
        assert_eq!(slot_after.position.as_deref(), Some("4"));
    }

    #[test]
    fn test_best_lap_tracked_from_merged_state() {
        let mut processor = TimingProcessor::new();
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"BestLapTime": {"Value": "1:32.456", "Lap": 3}}}}"#,
        ));
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"BestLapTime": {"Value": "1:31.900", "Lap": 5}}}}"#,
        ));

        let best = processor.state().best_lap("44").unwrap();
        assert_eq!(best.time, LapTime::parse("1:31.900").unwrap());

        processor.apply(&data_point(
            r#"{"Lines": {"44": {"BestLapTime": {"Value": ""}}}}"#,
        ));
        assert!(processor.state().best_lap("44").is_none());
    }

    struct RecordingSink {
        seen: Arc<Mutex<Vec<(String, u32, Option<String>)>>>,
        fail: bool,
    }

    impl LapSink for RecordingSink {
        fn lap_completed(&mut self, lap: &CompletedLap) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((
                lap.driver_number.clone(),
                lap.lap_number,
                lap.data
                    .last_lap_time
                    .as_ref()
                    .and_then(|t| t.value.clone()),
            ));
            if self.fail {
                anyhow::bail!("storage unavailable");
            }
            Ok(())
        }
    }

    #[test]
    fn test_sink_receives_frozen_lap_on_supersession() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut processor = TimingProcessor::new().with_sink(Box::new(RecordingSink {
            seen: Arc::clone(&seen),
            fail: false,
        }));

        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 7}}}"#));
        processor.apply(&data_point(
            r#"{"Lines": {"44": {"LastLapTime": {"Value": "1:33.000"}}}}"#,
        ));
        assert!(seen.lock().unwrap().is_empty());

        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 8}}}"#));

        let completed = seen.lock().unwrap();
        assert_eq!(
            completed.as_slice(),
            &[("44".to_string(), 7, Some("1:33.000".to_string()))]
        );
    }

    #[test]
    fn test_sink_failure_does_not_affect_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut processor = TimingProcessor::new().with_sink(Box::new(RecordingSink {
            seen,
            fail: true,
        }));

        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 7}}}"#));
        processor.apply(&data_point(r#"{"Lines": {"44": {"NumberOfLaps": 8}}}"#));

        assert!(processor.state().lap("44", 7).is_some());
        assert!(processor.state().lap("44", 8).is_some());
    }

    #[test]
    fn test_reader_snapshot_stable_while_processor_mutates() {
        let mut processor = TimingProcessor::new();
        let state = processor.state();

        processor.apply(&data_point(r#"{"Lines": {"44": {"Position": "1"}}}"#));
        let held = state.latest();
        processor.apply(&data_point(r#"{"Lines": {"44": {"Position": "2"}}}"#));

        assert_eq!(held.lines["44"].position.as_deref(), Some("1"));
        assert_eq!(state.latest().lines["44"].position.as_deref(), Some("2"));
    }
}
