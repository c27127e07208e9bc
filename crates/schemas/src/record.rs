//! The raw record envelope and the closed set of tracked record kinds.
//!
//! Feed readers produce [`RawRecord`]s; the pipeline's consumer resolves each
//! record's tag against [`RecordKind`] and decodes the payload into the
//! [`DecodedRecord`] union. The source emits more topics than the pipeline
//! tracks; tags outside the closed set resolve to `None` and are skipped
//! without being treated as errors.

use crate::session::{
    DriverListDataPoint, HeartbeatDataPoint, LapCountDataPoint, RaceControlMessagesDataPoint,
    SessionInfoDataPoint, TrackStatusDataPoint, WeatherDataPoint,
};
use crate::stints::TimingAppDataPoint;
use crate::timing::TimingDataPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One record as received from the feed: a type tag, an opaque JSON payload,
/// and the source-side timestamp. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Topic tag as transmitted (`"TimingData"`).
    pub kind: String,

    /// JSON payload text. `None` when the source sent an empty body.
    pub payload: Option<String>,

    /// Source-side emission time; replay pacing is derived from it.
    pub timestamp: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(
        kind: impl Into<String>,
        payload: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload.into()),
            timestamp,
        }
    }
}

/// The closed set of record kinds the pipeline tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Heartbeat,
    TimingData,
    TimingAppData,
    DriverList,
    TrackStatus,
    LapCount,
    SessionInfo,
    WeatherData,
    RaceControlMessages,
}

impl RecordKind {
    /// Every tracked kind, in subscription-dump fan-out order.
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Heartbeat,
        RecordKind::DriverList,
        RecordKind::TrackStatus,
        RecordKind::LapCount,
        RecordKind::WeatherData,
        RecordKind::SessionInfo,
        RecordKind::TimingData,
        RecordKind::TimingAppData,
        RecordKind::RaceControlMessages,
    ];

    /// Resolve a wire tag. Unknown tags return `None`; the source emits
    /// topics this pipeline does not track.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Heartbeat" => Some(Self::Heartbeat),
            "TimingData" => Some(Self::TimingData),
            "TimingAppData" => Some(Self::TimingAppData),
            "DriverList" => Some(Self::DriverList),
            "TrackStatus" => Some(Self::TrackStatus),
            "LapCount" => Some(Self::LapCount),
            "SessionInfo" => Some(Self::SessionInfo),
            "WeatherData" => Some(Self::WeatherData),
            "RaceControlMessages" => Some(Self::RaceControlMessages),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Heartbeat => "Heartbeat",
            Self::TimingData => "TimingData",
            Self::TimingAppData => "TimingAppData",
            Self::DriverList => "DriverList",
            Self::TrackStatus => "TrackStatus",
            Self::LapCount => "LapCount",
            Self::SessionInfo => "SessionInfo",
            Self::WeatherData => "WeatherData",
            Self::RaceControlMessages => "RaceControlMessages",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A decoded payload, one variant per tracked kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    Heartbeat(HeartbeatDataPoint),
    TimingData(TimingDataPoint),
    TimingAppData(TimingAppDataPoint),
    DriverList(DriverListDataPoint),
    TrackStatus(TrackStatusDataPoint),
    LapCount(LapCountDataPoint),
    SessionInfo(SessionInfoDataPoint),
    WeatherData(WeatherDataPoint),
    RaceControlMessages(RaceControlMessagesDataPoint),
}

impl DecodedRecord {
    /// Decode a payload for a resolved kind.
    ///
    /// The payload is first parsed as a JSON value so the feed's top-level
    /// `_kf` bookkeeping member can be stripped; it pollutes map-shaped
    /// payloads like `DriverList` and carries no data.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] when the payload is not valid JSON
    /// or does not match the kind's schema.
    pub fn decode(kind: RecordKind, payload: &str) -> Result<Self, DecodeError> {
        let mut value: serde_json::Value =
            serde_json::from_str(payload).map_err(|source| DecodeError::Malformed {
                kind,
                source,
            })?;
        if let Some(object) = value.as_object_mut() {
            object.remove("_kf");
        }

        let decoded = match kind {
            RecordKind::Heartbeat => Self::Heartbeat(from_value(kind, value)?),
            RecordKind::TimingData => Self::TimingData(from_value(kind, value)?),
            RecordKind::TimingAppData => Self::TimingAppData(from_value(kind, value)?),
            RecordKind::DriverList => Self::DriverList(from_value(kind, value)?),
            RecordKind::TrackStatus => Self::TrackStatus(from_value(kind, value)?),
            RecordKind::LapCount => Self::LapCount(from_value(kind, value)?),
            RecordKind::SessionInfo => Self::SessionInfo(from_value(kind, value)?),
            RecordKind::WeatherData => Self::WeatherData(from_value(kind, value)?),
            RecordKind::RaceControlMessages => Self::RaceControlMessages(from_value(kind, value)?),
        };
        Ok(decoded)
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Heartbeat(_) => RecordKind::Heartbeat,
            Self::TimingData(_) => RecordKind::TimingData,
            Self::TimingAppData(_) => RecordKind::TimingAppData,
            Self::DriverList(_) => RecordKind::DriverList,
            Self::TrackStatus(_) => RecordKind::TrackStatus,
            Self::LapCount(_) => RecordKind::LapCount,
            Self::SessionInfo(_) => RecordKind::SessionInfo,
            Self::WeatherData(_) => RecordKind::WeatherData,
            Self::RaceControlMessages(_) => RecordKind::RaceControlMessages,
        }
    }
}

fn from_value<T: serde::de::DeserializeOwned>(
    kind: RecordKind,
    value: serde_json::Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
}

/// Per-record decode failure. Contained to the failing record; the pipeline
/// logs it and moves on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },
}
