//! Capture replay feed reader.
//!
//! A capture directory holds two files recorded from a live session:
//! `subscribe.txt`, the one-shot dump received at subscription time, and
//! `live.txt`, one raw feed message per line. This client fans the dump out
//! as synthetic records, derives the replay clock offset from the dump's
//! heartbeat, and streams the live file into the pipeline's ingestion
//! queue. The pipeline's pacing then reproduces the session's original
//! timing.
//!
//! The push transport that produced these captures lives outside this
//! crate; everything here consumes its recorded output.

#![deny(static_mut_refs)]

mod dump;
mod line;

pub use line::parse_feed_line;

use anyhow::Context;
use pitwall_pipeline::ReplayPipeline;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Replays a recorded capture directory through an ingestion pipeline.
pub struct ReplayTimingClient {
    pipeline: ReplayPipeline,
    reader: Option<JoinHandle<()>>,
}

impl ReplayTimingClient {
    pub fn new(pipeline: ReplayPipeline) -> Self {
        Self {
            pipeline,
            reader: None,
        }
    }

    /// The underlying pipeline, for queue depth and diagnostic access.
    pub fn pipeline(&self) -> &ReplayPipeline {
        &self.pipeline
    }

    /// Start replaying a capture directory.
    ///
    /// Reads the subscription dump, computes the clock offset from its
    /// heartbeat (zero, with a warning, when absent), enqueues one synthetic
    /// record per tracked topic, and spawns a reader that streams `live.txt`
    /// into the queue. Per-line parse failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails when the capture files cannot be read or the pipeline is
    /// already running; starting twice without stopping is a programming
    /// error surfaced by the pipeline.
    pub async fn start(&mut self, directory: &Path) -> anyhow::Result<()> {
        let subscription_path = directory.join("subscribe.txt");
        let subscription = tokio::fs::read_to_string(&subscription_path)
            .await
            .with_context(|| {
                format!(
                    "failed to read subscription dump {}",
                    subscription_path.display()
                )
            })?;

        let live_path = directory.join("live.txt");
        let live_file = tokio::fs::File::open(&live_path)
            .await
            .with_context(|| format!("failed to open capture stream {}", live_path.display()))?;

        let queue = self.pipeline.start()?;

        let heartbeat = dump::subscription_heartbeat(&subscription);
        match heartbeat {
            Some(heartbeat_utc) => {
                let offset = chrono::Utc::now() - heartbeat_utc;
                self.pipeline.clock_offset().set(offset);
                info!(
                    offset_ms = offset.num_milliseconds(),
                    heartbeat = %heartbeat_utc,
                    "Calculated replay clock offset from subscription heartbeat"
                );
            }
            None => {
                warn!(
                    "No heartbeat in subscription dump; replaying without a clock offset"
                );
            }
        }

        // Stamp the synthetic dump records with the source-side heartbeat
        // time so the clock offset shifts them to "now" instead of pacing
        // them a full offset into the future.
        let dump_timestamp = heartbeat.unwrap_or_else(chrono::Utc::now);
        for record in dump::subscription_dump_records(&subscription, dump_timestamp) {
            queue.enqueue(record);
        }

        let reader = tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(live_file).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line::parse_feed_line(&line) {
                            Ok(record) => queue.enqueue(record),
                            Err(error) => {
                                warn!(error = %error, "Failed to parse feed line, skipping")
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(error = %error, "Failed reading capture stream");
                        break;
                    }
                }
            }
            debug!("Capture stream fully enqueued");
        });
        self.reader = Some(reader);

        info!(directory = %directory.display(), "Replay started");
        Ok(())
    }

    /// Stop the reader and the pipeline. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates pipeline shutdown failures.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
        self.pipeline.stop().await?;
        Ok(())
    }
}

/// List capture directories under a root: directories whose files are
/// exactly the capture pair (`live.txt` / `subscribe.txt`).
pub fn capture_directories(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut directories: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            std::fs::read_dir(path).is_ok_and(|files| {
                let mut any = false;
                for file in files.flatten() {
                    let name = file.file_name();
                    let name = name.to_string_lossy();
                    if name != "live.txt" && name != "subscribe.txt" {
                        return false;
                    }
                    any = true;
                }
                any
            })
        })
        .collect();
    directories.sort();
    directories
}
