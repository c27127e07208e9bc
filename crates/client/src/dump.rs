//! Subscription dump handling.
//!
//! Subscribing to the live source returns a one-shot object carrying the
//! current value of every topic. The dump uses arrays where the stream uses
//! indexed maps (`Sectors`, `Stints`, race control `Messages`), so those are
//! normalized before the topics are re-fed through the queue as synthetic
//! records. The caller picks the timestamp; the replay client uses the
//! dump's own heartbeat time so the clock offset shifts these records to
//! the present.

use chrono::{DateTime, Utc};
use pitwall_schemas::{HeartbeatDataPoint, RawRecord, RecordKind};
use serde_json::Value;
use tracing::warn;

/// Extract the dump's heartbeat timestamp, the anchor for the replay clock
/// offset.
pub(crate) fn subscription_heartbeat(subscription: &str) -> Option<DateTime<Utc>> {
    let value: Value = serde_json::from_str(subscription).ok()?;
    let heartbeat = value.get("Heartbeat")?.clone();
    serde_json::from_value::<HeartbeatDataPoint>(heartbeat)
        .ok()
        .map(|heartbeat| heartbeat.utc)
}

/// Convert the dump into one synthetic record per tracked topic, in fan-out
/// order. An unparseable dump yields no records; the live stream still
/// plays.
pub(crate) fn subscription_dump_records(
    subscription: &str,
    now: DateTime<Utc>,
) -> Vec<RawRecord> {
    let topics: Value = match serde_json::from_str(subscription) {
        Ok(value) => value,
        Err(error) => {
            warn!(error = %error, "Subscription dump is not valid JSON; skipping it");
            return Vec::new();
        }
    };
    let Some(topics) = topics.as_object() else {
        warn!("Subscription dump is not an object; skipping it");
        return Vec::new();
    };

    let mut records = Vec::new();
    for kind in RecordKind::ALL {
        let Some(topic) = topics.get(kind.as_tag()) else {
            continue;
        };
        let normalized = normalize_dump_topic(kind, topic.clone());
        records.push(RawRecord::new(kind.as_tag(), normalized.to_string(), now));
    }
    records
}

fn normalize_dump_topic(kind: RecordKind, mut topic: Value) -> Value {
    match kind {
        RecordKind::TimingData => normalize_lines(&mut topic, "Sectors"),
        RecordKind::TimingAppData => normalize_lines(&mut topic, "Stints"),
        RecordKind::RaceControlMessages => {
            if let Some(messages) = topic.get_mut("Messages") {
                array_to_indexed_map(messages);
            }
        }
        _ => {}
    }
    topic
}

fn normalize_lines(topic: &mut Value, field: &str) {
    let Some(lines) = topic.get_mut("Lines").and_then(Value::as_object_mut) else {
        return;
    };
    for line in lines.values_mut() {
        if let Some(value) = line.get_mut(field) {
            array_to_indexed_map(value);
        }
    }
}

/// Rewrite a JSON array as an object keyed by element index, matching the
/// shape the stream uses for the same field.
fn array_to_indexed_map(value: &mut Value) {
    let Some(array) = value.as_array() else {
        return;
    };
    let map: serde_json::Map<String, Value> = array
        .iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item.clone()))
        .collect();
    *value = Value::Object(map);
}
