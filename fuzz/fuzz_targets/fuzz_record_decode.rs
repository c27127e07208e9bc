//! Fuzzes payload decoding across every tracked record kind.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_record_decode
#![no_main]
use libfuzzer_sys::fuzz_target;
use pitwall_schemas::{DecodedRecord, RecordKind};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // Use the first byte to select a kind, then fuzz the rest as payload.
    let kind = RecordKind::ALL[data[0] as usize % RecordKind::ALL.len()];
    if let Ok(payload) = std::str::from_utf8(&data[1..]) {
        let _ = DecodedRecord::decode(kind, payload);
    }
});
