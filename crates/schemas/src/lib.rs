//! Schema definitions for the OpenPitwall live timing pipeline.
//!
//! This crate contains the raw record envelope produced by feed readers, the
//! closed set of tracked record kinds, the typed data points each kind decodes
//! into, and the field-level merge semantics used to fold partial updates into
//! cumulative state.
//!
//! ## Modules
//! - `record` - `RawRecord` envelope, `RecordKind` tag, `DecodedRecord` union
//! - `timing` - Per-driver timing lines (`TimingDataPoint`, `DriverTiming`)
//! - `stints` - Tyre stint data (`TimingAppDataPoint`)
//! - `session` - Session-scoped data points (heartbeat, track status, weather, ...)
//! - `laptime` - Duration-backed lap time parsing and formatting

#![deny(static_mut_refs)]

pub mod laptime;
pub mod record;
pub mod session;
pub mod stints;
pub mod timing;

pub use laptime::LapTime;
pub use record::{DecodeError, DecodedRecord, RawRecord, RecordKind};
pub use session::{
    CircuitInfo, DriverInfo, DriverListDataPoint, HeartbeatDataPoint, LapCountDataPoint,
    MeetingInfo, RaceControlMessage, RaceControlMessagesDataPoint, SessionInfoDataPoint,
    TrackStatusDataPoint, WeatherDataPoint,
};
pub use stints::{DriverStint, Stint, TimingAppDataPoint};
pub use timing::{DriverTiming, IntervalGap, TimedSector, TimingDataPoint};
