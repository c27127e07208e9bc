//! Capture writing and completed-lap persistence.
//!
//! Two durable outputs mirror the two things worth keeping from a live
//! session: [`CaptureWriter`] tees the raw record stream back out in the
//! capture-directory format the replay client reads, and [`LapStore`]
//! appends each frozen lap snapshot as one JSON line. Both are optional
//! collaborators; their failures never touch in-memory session state.

#![deny(static_mut_refs)]

use anyhow::Context;
use chrono::SecondsFormat;
use pitwall_processing::{CompletedLap, LapSink};
use pitwall_schemas::{DriverTiming, RawRecord};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a capture directory (`subscribe.txt` + `live.txt`) that the replay
/// client can play back.
pub struct CaptureWriter {
    directory: PathBuf,
    live: Option<BufWriter<File>>,
    records_written: usize,
}

impl CaptureWriter {
    /// Create the capture directory (and parents) if needed.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created.
    pub fn new(directory: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create capture directory {}", directory.display()))?;
        Ok(Self {
            directory,
            live: None,
            records_written: 0,
        })
    }

    /// Write the one-shot subscription dump.
    ///
    /// # Errors
    ///
    /// Fails on IO errors.
    pub fn write_subscription(&mut self, dump: &str) -> anyhow::Result<()> {
        let path = self.directory.join("subscribe.txt");
        std::fs::write(&path, dump)
            .with_context(|| format!("failed to write subscription dump {}", path.display()))
    }

    /// Append one raw record to the live stream file, in the wrapped
    /// `{"A": [tag, payload, timestamp]}` line form.
    ///
    /// # Errors
    ///
    /// Fails on IO errors; the caller logs and keeps the in-memory pipeline
    /// running.
    pub fn append(&mut self, record: &RawRecord) -> anyhow::Result<()> {
        if self.live.is_none() {
            let path = self.directory.join("live.txt");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open capture stream {}", path.display()))?;
            self.live = Some(BufWriter::new(file));
        }
        let writer = self
            .live
            .as_mut()
            .context("capture stream writer unavailable")?;

        writeln!(writer, "{}", feed_line(record)).context("failed to append capture record")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush buffered records and report what was written.
    ///
    /// # Errors
    ///
    /// Fails when the final flush fails.
    pub fn finish(mut self) -> anyhow::Result<usize> {
        if let Some(writer) = self.live.as_mut() {
            writer.flush().context("failed to flush capture stream")?;
        }
        info!(
            directory = %self.directory.display(),
            records = self.records_written,
            "Capture finished"
        );
        Ok(self.records_written)
    }
}

/// Serialize a record as one capture line. A payload that is itself JSON is
/// inlined as a value, matching how live captures look on disk; anything
/// else is carried as a string.
fn feed_line(record: &RawRecord) -> String {
    let payload = match &record.payload {
        None => serde_json::Value::Null,
        Some(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.clone())),
    };
    serde_json::json!({
        "A": [
            record.kind,
            payload,
            record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        ]
    })
    .to_string()
}

#[derive(Serialize)]
struct StoredLap<'a> {
    driver_number: &'a str,
    lap_number: u32,
    data: &'a DriverTiming,
}

/// Appends frozen lap snapshots as JSON lines, one per completed lap.
pub struct LapStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl LapStore {
    /// Create a store appending to the given file, creating parents.
    ///
    /// # Errors
    ///
    /// Fails when the parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create lap store directory {}", parent.display()))?;
        }
        Ok(Self { path, writer: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LapSink for LapStore {
    fn lap_completed(&mut self, lap: &CompletedLap) -> anyhow::Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| format!("failed to open lap store {}", self.path.display()))?;
            self.writer = Some(BufWriter::new(file));
        }
        let writer = self.writer.as_mut().context("lap store writer unavailable")?;

        let stored = StoredLap {
            driver_number: &lap.driver_number,
            lap_number: lap.lap_number,
            data: lap.data.as_ref(),
        };
        let line = serde_json::to_string(&stored).context("failed to serialize lap snapshot")?;
        writeln!(writer, "{line}").context("failed to append lap snapshot")?;
        writer.flush().context("failed to flush lap store")
    }
}
