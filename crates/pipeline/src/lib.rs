//! The OpenPitwall ingestion and replay pipeline.
//!
//! Feed readers enqueue raw records; a single consumer task re-times their
//! delivery to match the source's original spacing (shifted by a clock
//! offset derived from the stream's first heartbeat), decodes each payload,
//! and fans it out to the registered processors.
//!
//! ## Modules
//! - `queue` - The unbounded, order-preserving ingestion queue
//! - `replay` - The paced consumer and pipeline lifecycle
//! - `error` - Pipeline lifecycle errors

#![deny(static_mut_refs)]

pub mod error;
pub mod queue;
pub mod replay;

pub use error::PipelineError;
pub use queue::IngestionQueue;
pub use replay::{ClockOffset, RECENT_RECORDS, ReplayPipeline};
