//! Feed line parsing.
//!
//! Each `live.txt` line is one push message: either the wrapped form
//! `{"A": [tag, payload, timestamp]}` or a bare three-element array. The
//! payload element is an object for map-shaped topics and a string for
//! pre-serialized ones; both are carried onward as JSON text.

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use pitwall_schemas::RawRecord;

/// Parse one capture line into a raw record.
///
/// # Errors
///
/// Fails on malformed JSON, a non-array message shape, or an unparseable
/// timestamp. Callers skip the line and keep streaming.
pub fn parse_feed_line(line: &str) -> anyhow::Result<RawRecord> {
    let value: serde_json::Value =
        serde_json::from_str(line).context("feed line is not valid JSON")?;
    let message = value.get("A").unwrap_or(&value);
    let Some(parts) = message.as_array() else {
        bail!("feed line is not an array message");
    };
    if parts.len() < 3 {
        bail!("feed line has {} elements, expected 3", parts.len());
    }

    let kind = parts[0]
        .as_str()
        .context("feed line type tag is not a string")?
        .to_string();

    let payload = match &parts[1] {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        object => Some(object.to_string()),
    };

    let timestamp_text = parts[2]
        .as_str()
        .context("feed line timestamp is not a string")?;
    let timestamp: DateTime<Utc> = timestamp_text
        .parse()
        .with_context(|| format!("unparseable feed timestamp {timestamp_text:?}"))?;

    Ok(RawRecord {
        kind,
        payload,
        timestamp,
    })
}
