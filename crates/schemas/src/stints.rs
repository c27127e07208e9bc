//! Tyre stint data from `TimingAppData` records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A `TimingAppData` record: partial per-driver stint updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingAppDataPoint {
    pub lines: HashMap<String, DriverStint>,
}

impl TimingAppDataPoint {
    pub fn merge_from(&mut self, update: &Self) {
        for (driver_number, line) in &update.lines {
            match self.lines.get_mut(driver_number) {
                Some(current) => current.merge_from(line),
                None => {
                    self.lines.insert(driver_number.clone(), line.clone());
                }
            }
        }
    }
}

/// One driver's stint history. Stints are keyed by their 0-based index and
/// updated incrementally as laps accumulate on the current set of tyres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DriverStint {
    pub line: Option<u32>,

    pub grid_pos: Option<String>,

    pub stints: BTreeMap<u32, Stint>,
}

impl DriverStint {
    pub fn merge_from(&mut self, update: &Self) {
        if update.line.is_some() {
            self.line = update.line;
        }
        if update.grid_pos.is_some() {
            self.grid_pos = update.grid_pos.clone();
        }
        for (index, stint) in &update.stints {
            match self.stints.get_mut(index) {
                Some(current) => current.merge_from(stint),
                None => {
                    self.stints.insert(*index, stint.clone());
                }
            }
        }
    }
}

/// One stint on a set of tyres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Stint {
    /// Tyre compound name (`"SOFT"`, `"INTERMEDIATE"`).
    pub compound: Option<String>,

    /// Whether the set was new at fitting, as the feed formats it (`"true"`).
    pub new: Option<String>,

    pub tyres_not_changed: Option<String>,

    pub total_laps: Option<u32>,

    pub start_laps: Option<u32>,

    /// Best lap time set during this stint.
    pub lap_time: Option<String>,

    pub lap_number: Option<u32>,
}

impl Stint {
    pub fn merge_from(&mut self, update: &Self) {
        if update.compound.is_some() {
            self.compound = update.compound.clone();
        }
        if update.new.is_some() {
            self.new = update.new.clone();
        }
        if update.tyres_not_changed.is_some() {
            self.tyres_not_changed = update.tyres_not_changed.clone();
        }
        if update.total_laps.is_some() {
            self.total_laps = update.total_laps;
        }
        if update.start_laps.is_some() {
            self.start_laps = update.start_laps;
        }
        if update.lap_time.is_some() {
            self.lap_time = update.lap_time.clone();
        }
        if update.lap_number.is_some() {
            self.lap_number = update.lap_number;
        }
    }
}
