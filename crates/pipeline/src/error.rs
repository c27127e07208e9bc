//! Pipeline lifecycle errors.

use thiserror::Error;

/// Errors from pipeline lifecycle operations. Per-record failures never
/// surface here; they are contained and logged inside the consumer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A second consumer would race the first on the same state. The caller
    /// must stop the pipeline before starting it again.
    #[error("pipeline is already running; stop it before starting again")]
    AlreadyRunning,

    /// The consumer task ended abnormally and its processors are gone. The
    /// pipeline cannot be restarted.
    #[error("pipeline consumer task was lost: {0}")]
    ConsumerLost(String),
}
