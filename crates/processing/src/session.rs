//! Latest-state processors for the non-timing topics.
//!
//! These are small compared to the timing merger: each folds its topic into
//! a single latest view (replacing or merging as the topic's update shape
//! demands) and republishes a snapshot per record.

use crate::processor::Processor;
use crate::publish::Published;
use pitwall_schemas::{
    DecodedRecord, DriverListDataPoint, LapCountDataPoint, RaceControlMessage, RecordKind,
    SessionInfoDataPoint, TimingAppDataPoint, TrackStatusDataPoint, WeatherDataPoint,
};
use std::collections::BTreeMap;

/// Track condition flag. Updates arrive whole; replace-latest.
#[derive(Default)]
pub struct TrackStatusProcessor {
    published: Published<Option<TrackStatusDataPoint>>,
}

impl TrackStatusProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<Option<TrackStatusDataPoint>> {
        self.published.clone()
    }
}

impl Processor for TrackStatusProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::TrackStatus]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::TrackStatus(status) = record {
            self.published.publish(Some(status.clone()));
        }
    }
}

/// Session identity. Replace-latest.
#[derive(Default)]
pub struct SessionInfoProcessor {
    published: Published<Option<SessionInfoDataPoint>>,
}

impl SessionInfoProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<Option<SessionInfoDataPoint>> {
        self.published.clone()
    }
}

impl Processor for SessionInfoProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::SessionInfo]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::SessionInfo(info) = record {
            self.published.publish(Some(info.clone()));
        }
    }
}

/// Weather samples. Replace-latest.
#[derive(Default)]
pub struct WeatherProcessor {
    published: Published<Option<WeatherDataPoint>>,
}

impl WeatherProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<Option<WeatherDataPoint>> {
        self.published.clone()
    }
}

impl Processor for WeatherProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::WeatherData]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::WeatherData(weather) = record {
            self.published.publish(Some(weather.clone()));
        }
    }
}

/// Race lap counter. Updates often omit the total; merge-latest.
#[derive(Default)]
pub struct LapCountProcessor {
    latest: LapCountDataPoint,
    published: Published<Option<LapCountDataPoint>>,
}

impl LapCountProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<Option<LapCountDataPoint>> {
        self.published.clone()
    }
}

impl Processor for LapCountProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::LapCount]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::LapCount(count) = record {
            self.latest.merge_from(count);
            self.published.publish(Some(self.latest));
        }
    }
}

/// Driver roster. Entry-level merge; `line` updates keep flowing after the
/// identity fields arrive once at subscription time.
#[derive(Default)]
pub struct DriverListProcessor {
    latest: DriverListDataPoint,
    published: Published<DriverListDataPoint>,
}

impl DriverListProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<DriverListDataPoint> {
        self.published.clone()
    }
}

impl Processor for DriverListProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::DriverList]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::DriverList(roster) = record {
            self.latest.merge_from(roster);
            self.published.publish(self.latest.clone());
        }
    }
}

/// Tyre stint data. Nested merge per driver and stint index.
#[derive(Default)]
pub struct StintProcessor {
    latest: TimingAppDataPoint,
    published: Published<TimingAppDataPoint>,
}

impl StintProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Published<TimingAppDataPoint> {
        self.published.clone()
    }
}

impl Processor for StintProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::TimingAppData]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::TimingAppData(stints) = record {
            self.latest.merge_from(stints);
            self.published.publish(self.latest.clone());
        }
    }
}

/// Race control messages: an append-only session log keyed by the feed's
/// message index.
#[derive(Default)]
pub struct RaceControlProcessor {
    messages: BTreeMap<u32, RaceControlMessage>,
    published: Published<BTreeMap<u32, RaceControlMessage>>,
}

impl RaceControlProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Published<BTreeMap<u32, RaceControlMessage>> {
        self.published.clone()
    }
}

impl Processor for RaceControlProcessor {
    fn interests(&self) -> &'static [RecordKind] {
        &[RecordKind::RaceControlMessages]
    }

    fn process(&mut self, record: &DecodedRecord) {
        if let DecodedRecord::RaceControlMessages(update) = record {
            for (index, message) in &update.messages {
                self.messages.insert(*index, message.clone());
            }
            self.published.publish(self.messages.clone());
        }
    }
}
