//! Best completed lap tracking with reset-on-clear semantics.

use pitwall_schemas::{DriverTiming, LapTime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The fastest completed lap seen for a driver since the last reset.
#[derive(Debug, Clone)]
pub struct BestLap {
    /// Parsed lap time; comparisons happen on this, never on the text.
    pub time: LapTime,

    /// Lap number the time was set on, when the feed attributed one.
    pub lap: Option<u32>,

    /// The driver's merged timing line at the moment the best was recorded.
    pub snapshot: Arc<DriverTiming>,
}

/// Derives per-driver best laps from merged timing state.
///
/// The feed wipes best-lap values between session segments (a blank value in
/// place of a time, typically between qualifying parts); a wipe removes the
/// stored best entirely so the next segment accumulates a fresh one.
#[derive(Debug, Default)]
pub struct BestLapTracker {
    best: HashMap<String, BestLap>,
}

impl BestLapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a driver's freshly merged timing line into the tracker.
    ///
    /// Called after every merge for that driver. An unparseable value is
    /// logged and skipped; the rest of the record has already been applied
    /// and stays applied.
    pub fn observe(&mut self, driver_number: &str, merged: &DriverTiming) {
        let Some(best_lap_time) = &merged.best_lap_time else {
            return;
        };

        if best_lap_time.is_cleared() {
            if self.best.remove(driver_number).is_some() {
                debug!(
                    driver = driver_number,
                    "Best lap wiped by the feed, removing entry"
                );
            }
            return;
        }

        let Some(value) = best_lap_time.value.as_deref() else {
            return;
        };
        let Some(parsed) = LapTime::parse(value) else {
            warn!(
                driver = driver_number,
                value, "Skipping unparseable best lap value"
            );
            return;
        };

        let improved = match self.best.get(driver_number) {
            Some(existing) => parsed < existing.time,
            None => true,
        };
        if improved {
            self.best.insert(
                driver_number.to_string(),
                BestLap {
                    time: parsed,
                    lap: best_lap_time.lap,
                    snapshot: Arc::new(merged.clone()),
                },
            );
        }
    }

    pub fn best_for(&self, driver_number: &str) -> Option<&BestLap> {
        self.best.get(driver_number)
    }

    /// The full per-driver map, for snapshot publication.
    pub fn all(&self) -> &HashMap<String, BestLap> {
        &self.best
    }
}
