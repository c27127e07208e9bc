//! Session-scoped data points: heartbeat, track status, lap count, session
//! metadata, weather, the driver roster, and race control messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The source's keep-alive, carrying its own wall clock. The first heartbeat
/// of a stream anchors the replay clock offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeartbeatDataPoint {
    pub utc: DateTime<Utc>,
}

/// Current track condition flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TrackStatusDataPoint {
    /// Numeric status code as the feed formats it (`"1"` = clear).
    pub status: Option<String>,
    pub message: Option<String>,
}

/// Race lap counter. Updates frequently omit the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LapCountDataPoint {
    pub current_lap: Option<u32>,
    pub total_laps: Option<u32>,
}

impl LapCountDataPoint {
    pub fn merge_from(&mut self, update: &Self) {
        if update.current_lap.is_some() {
            self.current_lap = update.current_lap;
        }
        if update.total_laps.is_some() {
            self.total_laps = update.total_laps;
        }
    }
}

/// Session identity and venue metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionInfoDataPoint {
    pub name: Option<String>,

    #[serde(rename = "Type")]
    pub kind: Option<String>,

    pub start_date: Option<String>,

    pub gmt_offset: Option<String>,

    pub meeting: Option<MeetingInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeetingInfo {
    pub name: Option<String>,
    pub circuit: Option<CircuitInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CircuitInfo {
    pub short_name: Option<String>,
}

/// Trackside weather sample. The feed sends every field as formatted text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WeatherDataPoint {
    pub air_temp: Option<String>,
    pub humidity: Option<String>,
    pub pressure: Option<String>,
    pub rainfall: Option<String>,
    pub track_temp: Option<String>,
    pub wind_direction: Option<String>,
    pub wind_speed: Option<String>,
}

/// The driver roster, keyed by racing number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverListDataPoint {
    pub drivers: HashMap<String, DriverInfo>,
}

impl DriverListDataPoint {
    pub fn merge_from(&mut self, update: &Self) {
        for (driver_number, info) in &update.drivers {
            match self.drivers.get_mut(driver_number) {
                Some(current) => current.merge_from(info),
                None => {
                    self.drivers.insert(driver_number.clone(), info.clone());
                }
            }
        }
    }
}

/// One roster entry. Most fields arrive once at subscription time; `line`
/// updates keep flowing as the classification changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DriverInfo {
    pub racing_number: Option<String>,

    pub broadcast_name: Option<String>,

    pub full_name: Option<String>,

    /// Three-letter abbreviation shown on the timing tower.
    pub tla: Option<String>,

    pub team_name: Option<String>,

    /// Team colour as a hex string without the leading `#`.
    pub team_colour: Option<String>,

    pub line: Option<u32>,
}

impl DriverInfo {
    pub fn merge_from(&mut self, update: &Self) {
        if update.racing_number.is_some() {
            self.racing_number = update.racing_number.clone();
        }
        if update.broadcast_name.is_some() {
            self.broadcast_name = update.broadcast_name.clone();
        }
        if update.full_name.is_some() {
            self.full_name = update.full_name.clone();
        }
        if update.tla.is_some() {
            self.tla = update.tla.clone();
        }
        if update.team_name.is_some() {
            self.team_name = update.team_name.clone();
        }
        if update.team_colour.is_some() {
            self.team_colour = update.team_colour.clone();
        }
        if update.line.is_some() {
            self.line = update.line;
        }
    }
}

/// Race control messages, keyed by their position in the session log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RaceControlMessagesDataPoint {
    pub messages: BTreeMap<u32, RaceControlMessage>,
}

/// One steward/race-director message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RaceControlMessage {
    /// Source wall-clock time, kept as text: race control timestamps arrive
    /// without a zone designator and are display-only.
    pub utc: Option<String>,
    pub category: Option<String>,
    pub flag: Option<String>,
    pub scope: Option<String>,
    pub message: Option<String>,
}
