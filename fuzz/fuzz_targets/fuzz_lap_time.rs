//! Fuzzes lap-time string parsing and its display round trip.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_lap_time
#![no_main]
use libfuzzer_sys::fuzz_target;
use pitwall_schemas::LapTime;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(time) = LapTime::parse(text) {
            // Formatting a parsed time must yield parseable text. The value
            // may differ below millisecond precision, which Display drops.
            assert!(LapTime::parse(&time.to_string()).is_some());
        }
    }
});
