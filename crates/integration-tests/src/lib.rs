//! Shared fixtures for the OpenPitwall end-to-end replay tests.
//!
//! `CaptureBuilder` writes synthetic capture directories in the on-disk
//! format the replay client reads; `build_session` wires every processor
//! into a pipeline the way an embedding process would and hands back the
//! read handles.

#![deny(rust_2018_idioms)]
#![deny(warnings)]
#![deny(unused_must_use)]

use chrono::{DateTime, Utc};
use pitwall_pipeline::ReplayPipeline;
use pitwall_processing::{
    Dispatcher, DriverListProcessor, LapCountProcessor, LapSink, Published, RaceControlProcessor,
    SessionInfoProcessor, StintProcessor, TimingProcessor, TimingState, TrackStatusProcessor,
    WeatherProcessor,
};
use pitwall_schemas::{
    DriverListDataPoint, LapCountDataPoint, RaceControlMessage, SessionInfoDataPoint,
    TimingAppDataPoint, TrackStatusDataPoint, WeatherDataPoint,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Install a test-writer tracing subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Builds a capture directory (`subscribe.txt` + `live.txt`).
#[derive(Default)]
pub struct CaptureBuilder {
    subscription: String,
    lines: Vec<String>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self {
            subscription: "{}".to_string(),
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn subscription(mut self, dump: &str) -> Self {
        self.subscription = dump.to_string();
        self
    }

    /// Append one wrapped feed message with an object or string payload
    /// given as JSON text.
    #[must_use]
    pub fn message(mut self, kind: &str, payload: &str, timestamp: DateTime<Utc>) -> Self {
        let payload: serde_json::Value = serde_json::from_str(payload)
            .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));
        let line = serde_json::json!({
            "A": [kind, payload, timestamp.to_rfc3339()]
        });
        self.lines.push(line.to_string());
        self
    }

    /// Append a raw line verbatim, for malformed-input scenarios.
    #[must_use]
    pub fn raw_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn write_to(&self, directory: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(directory)?;
        std::fs::write(directory.join("subscribe.txt"), &self.subscription)?;
        let mut live = self.lines.join("\n");
        live.push('\n');
        std::fs::write(directory.join("live.txt"), live)?;
        Ok(())
    }
}

/// Read handles over every processor's published state.
pub struct SessionHandles {
    pub timing: TimingState,
    pub track_status: Published<Option<TrackStatusDataPoint>>,
    pub lap_count: Published<Option<LapCountDataPoint>>,
    pub session_info: Published<Option<SessionInfoDataPoint>>,
    pub weather: Published<Option<WeatherDataPoint>>,
    pub driver_list: Published<DriverListDataPoint>,
    pub stints: Published<TimingAppDataPoint>,
    pub race_control: Published<BTreeMap<u32, RaceControlMessage>>,
}

/// Wire the full processor set into a pipeline, with optional lap sinks.
pub fn build_session(sinks: Vec<Box<dyn LapSink>>) -> (ReplayPipeline, SessionHandles) {
    let mut timing = TimingProcessor::new();
    for sink in sinks {
        timing = timing.with_sink(sink);
    }
    let track_status = TrackStatusProcessor::new();
    let lap_count = LapCountProcessor::new();
    let session_info = SessionInfoProcessor::new();
    let weather = WeatherProcessor::new();
    let driver_list = DriverListProcessor::new();
    let stints = StintProcessor::new();
    let race_control = RaceControlProcessor::new();

    let handles = SessionHandles {
        timing: timing.state(),
        track_status: track_status.latest(),
        lap_count: lap_count.latest(),
        session_info: session_info.latest(),
        weather: weather.latest(),
        driver_list: driver_list.latest(),
        stints: stints.latest(),
        race_control: race_control.messages(),
    };

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Box::new(timing));
    dispatcher.register(Box::new(track_status));
    dispatcher.register(Box::new(lap_count));
    dispatcher.register(Box::new(session_info));
    dispatcher.register(Box::new(weather));
    dispatcher.register(Box::new(driver_list));
    dispatcher.register(Box::new(stints));
    dispatcher.register(Box::new(race_control));

    (ReplayPipeline::new(dispatcher), handles)
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_for<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
