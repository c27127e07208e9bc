//! Per-driver timing lines.
//!
//! `TimingData` records are the densest topic on the feed: every record
//! carries a sparse subset of each driver's fields, and the receiver is
//! expected to fold them into cumulative state. Every type here therefore
//! exposes `merge_from`, which overwrites present fields and never erases
//! absent ones.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A `TimingData` record: partial timing lines keyed by driver number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimingDataPoint {
    /// Per-driver partial updates, keyed by racing number (`"44"`).
    pub lines: HashMap<String, DriverTiming>,
}

impl TimingDataPoint {
    /// Fold another record's lines into this one, line by line.
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

/// One driver's timing line. All fields are optional; a record carries only
/// what changed since the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DriverTiming {
    /// Formatted gap to the session leader (`"+12.345"`, `"1L"`).
    pub gap_to_leader: Option<String>,

    /// Gap to the car one classified position ahead.
    pub interval_to_position_ahead: Option<IntervalGap>,

    /// Timing-tower row the driver is displayed on.
    pub line: Option<u32>,

    /// Classified position, as the feed formats it.
    pub position: Option<String>,

    /// Whether the driver is currently in the pit lane.
    pub in_pit: Option<bool>,

    /// Whether the driver is on an out-lap from the pits.
    pub pit_out: Option<bool>,

    /// Whether the driver has retired from the session.
    pub retired: Option<bool>,

    pub number_of_pit_stops: Option<u32>,

    /// Completed lap count; a new value opens a new lap.
    pub number_of_laps: Option<u32>,

    pub last_lap_time: Option<TimedSector>,

    pub best_lap_time: Option<TimedSector>,

    /// Sector splits keyed by sector index (0-based).
    pub sectors: BTreeMap<u8, TimedSector>,
}

impl DriverTiming {
    /// Merge a partial update into this line, field by field.
    ///
    /// Present fields overwrite, absent fields are left alone, and nested
    /// times merge their own fields rather than replacing wholesale - a
    /// record that flags a sector personal-fastest without resending its
    /// value must not blank the value.
    pub fn merge_from(&mut self, update: &Self) {
        if update.gap_to_leader.is_some() {
            self.gap_to_leader = update.gap_to_leader.clone();
        }
        merge_nested(
            &mut self.interval_to_position_ahead,
            &update.interval_to_position_ahead,
            IntervalGap::merge_from,
        );
        if update.line.is_some() {
            self.line = update.line;
        }
        if update.position.is_some() {
            self.position = update.position.clone();
        }
        if update.in_pit.is_some() {
            self.in_pit = update.in_pit;
        }
        if update.pit_out.is_some() {
            self.pit_out = update.pit_out;
        }
        if update.retired.is_some() {
            self.retired = update.retired;
        }
        if update.number_of_pit_stops.is_some() {
            self.number_of_pit_stops = update.number_of_pit_stops;
        }
        if update.number_of_laps.is_some() {
            self.number_of_laps = update.number_of_laps;
        }
        merge_nested(
            &mut self.last_lap_time,
            &update.last_lap_time,
            TimedSector::merge_from,
        );
        merge_nested(
            &mut self.best_lap_time,
            &update.best_lap_time,
            TimedSector::merge_from,
        );
        for (index, sector) in &update.sectors {
            match self.sectors.get_mut(index) {
                Some(current) => current.merge_from(sector),
                None => {
                    self.sectors.insert(*index, sector.clone());
                }
            }
        }
    }
}

/// A timed value (lap or sector) with its fastest-so-far flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimedSector {
    /// Formatted time. An explicitly empty string is a clear signal: the
    /// source wipes completed values at session-segment boundaries.
    pub value: Option<String>,

    /// Lap number the time was set on, when the feed attributes one.
    pub lap: Option<u32>,

    pub overall_fastest: Option<bool>,

    pub personal_fastest: Option<bool>,
}

impl TimedSector {
    pub fn merge_from(&mut self, update: &Self) {
        if update.value.is_some() {
            self.value = update.value.clone();
        }
        if update.lap.is_some() {
            self.lap = update.lap;
        }
        if update.overall_fastest.is_some() {
            self.overall_fastest = update.overall_fastest;
        }
        if update.personal_fastest.is_some() {
            self.personal_fastest = update.personal_fastest;
        }
    }

    /// Whether the value field is present but blank - the clear signal.
    pub fn is_cleared(&self) -> bool {
        matches!(&self.value, Some(value) if value.trim().is_empty())
    }
}

/// Gap to the car ahead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntervalGap {
    pub value: Option<String>,
    pub catching: Option<bool>,
}

impl IntervalGap {
    pub fn merge_from(&mut self, update: &Self) {
        if update.value.is_some() {
            self.value = update.value.clone();
        }
        if update.catching.is_some() {
            self.catching = update.catching;
        }
    }
}

fn merge_nested<T: Clone>(current: &mut Option<T>, update: &Option<T>, merge: fn(&mut T, &T)) {
    if let Some(update) = update {
        match current {
            Some(current) => merge(current, update),
            None => *current = Some(update.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(json: &str) -> DriverTiming {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_deserializes_wire_names() {
        let update = line(
            r#"{
                "GapToLeader": "+4.500",
                "IntervalToPositionAhead": {"Value": "+0.433", "Catching": true},
                "Line": 3,
                "NumberOfLaps": 12,
                "LastLapTime": {"Value": "1:32.456", "PersonalFastest": true},
                "Sectors": {"0": {"Value": "26.259"}, "2": {"Value": "31.120", "OverallFastest": true}}
            }"#,
        );

        assert_eq!(update.gap_to_leader.as_deref(), Some("+4.500"));
        assert_eq!(update.number_of_laps, Some(12));
        assert_eq!(
            update.sectors.get(&2).and_then(|s| s.value.as_deref()),
            Some("31.120")
        );
        assert_eq!(
            update.sectors.get(&2).and_then(|s| s.overall_fastest),
            Some(true)
        );
        assert!(update.sectors.get(&1).is_none());
    }

    #[test]
    fn test_merge_absent_fields_never_erase() {
        let mut current = line(r#"{"Position": "4", "NumberOfLaps": 10}"#);
        current.merge_from(&line(r#"{"InPit": true}"#));

        assert_eq!(current.position.as_deref(), Some("4"));
        assert_eq!(current.number_of_laps, Some(10));
        assert_eq!(current.in_pit, Some(true));
    }

    #[test]
    fn test_merge_overwrites_per_field_not_per_record() {
        let mut current = line(r#"{"GapToLeader": "+1.000", "Position": "2"}"#);
        current.merge_from(&line(r#"{"GapToLeader": "+1.500"}"#));

        assert_eq!(current.gap_to_leader.as_deref(), Some("+1.500"));
        assert_eq!(current.position.as_deref(), Some("2"));
    }

    #[test]
    fn test_merge_nested_sector_keeps_sibling_fields() {
        let mut current = line(r#"{"Sectors": {"1": {"Value": "38.101"}}}"#);
        current.merge_from(&line(r#"{"Sectors": {"1": {"PersonalFastest": true}}}"#));

        let sector = current.sectors.get(&1).unwrap();
        assert_eq!(sector.value.as_deref(), Some("38.101"));
        assert_eq!(sector.personal_fastest, Some(true));
    }

    #[test]
    fn test_empty_value_overwrites_and_reads_as_cleared() {
        let mut current = line(r#"{"BestLapTime": {"Value": "1:31.900"}}"#);
        current.merge_from(&line(r#"{"BestLapTime": {"Value": ""}}"#));

        let best = current.best_lap_time.as_ref().unwrap();
        assert_eq!(best.value.as_deref(), Some(""));
        assert!(best.is_cleared());
    }

    #[test]
    fn test_data_point_merge_adds_new_drivers() {
        let mut current: TimingDataPoint =
            serde_json::from_str(r#"{"Lines": {"44": {"Line": 1}}}"#).unwrap();
        let update: TimingDataPoint =
            serde_json::from_str(r#"{"Lines": {"44": {"InPit": true}, "63": {"Line": 2}}}"#)
                .unwrap();
        current.merge_from(&update);

        assert_eq!(current.lines["44"].line, Some(1));
        assert_eq!(current.lines["44"].in_pit, Some(true));
        assert_eq!(current.lines["63"].line, Some(2));
    }

    fn timing_update_strategy() -> impl Strategy<Value = DriverTiming> {
        (
            proptest::option::of("[+0-9.:L]{1,9}"),
            proptest::option::of(0u32..100),
            proptest::option::of(proptest::bool::ANY),
            proptest::option::of(
                proptest::collection::btree_map(
                    0u8..3,
                    ("[0-9.:]{0,8}", proptest::option::of(proptest::bool::ANY)),
                    0..3,
                ),
            ),
        )
            .prop_map(|(gap, laps, in_pit, sectors)| DriverTiming {
                gap_to_leader: gap,
                number_of_laps: laps,
                in_pit,
                sectors: sectors
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(index, (value, personal))| {
                        (
                            index,
                            TimedSector {
                                value: Some(value),
                                personal_fastest: personal,
                                ..TimedSector::default()
                            },
                        )
                    })
                    .collect(),
                ..DriverTiming::default()
            })
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            base in timing_update_strategy(),
            update in timing_update_strategy(),
        ) {
            let mut once = base.clone();
            once.merge_from(&update);

            let mut twice = base;
            twice.merge_from(&update);
            twice.merge_from(&update);

            prop_assert_eq!(once, twice);
        }
    }
}
