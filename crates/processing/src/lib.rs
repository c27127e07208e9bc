//! Record processors for the OpenPitwall pipeline.
//!
//! The pipeline's consumer task owns every processor and drives them
//! synchronously, one decoded record at a time, so merging needs no locks.
//! Each processor publishes an immutable snapshot of its state after every
//! update; readers on other threads load those snapshots and never contend
//! with the consumer.
//!
//! ## Modules
//! - `processor` - The `Processor` trait and the interest-based `Dispatcher`
//! - `timing` - The per-driver timing merger with lap history and lap sinks
//! - `best` - The best-lap tracker with reset-on-clear semantics
//! - `session` - Latest-state processors for the non-timing topics
//! - `publish` - The single-writer snapshot publication primitive

#![deny(static_mut_refs)]

pub mod best;
pub mod processor;
pub mod publish;
pub mod session;
pub mod timing;

pub use best::{BestLap, BestLapTracker};
pub use processor::{Dispatcher, Processor};
pub use publish::Published;
pub use session::{
    DriverListProcessor, LapCountProcessor, RaceControlProcessor, SessionInfoProcessor,
    StintProcessor, TrackStatusProcessor, WeatherProcessor,
};
pub use timing::{CompletedLap, LapHistory, LapSink, TimingProcessor, TimingState};
