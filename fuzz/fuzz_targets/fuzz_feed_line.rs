//! Fuzzes the capture feed-line parser.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_feed_line
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = pitwall_client::parse_feed_line(line);
    }
});
