//! Snapshot publication for single-writer state.
//!
//! The consumer task is the only writer of processor state; rendering and
//! persistence collaborators read from other threads. Instead of sharing the
//! mutable structures behind a lock, each processor publishes an immutable
//! snapshot after every update. Readers load the current snapshot without
//! ever blocking the writer, and the writer never waits for readers.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// A handle to the latest published snapshot of some state.
///
/// Cloning the handle is cheap and shares the underlying slot; every clone
/// observes subsequent publications.
#[derive(Debug)]
pub struct Published<T>(Arc<ArcSwap<T>>);

impl<T> Published<T> {
    pub fn new(initial: T) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(initial)))
    }

    /// Load the current snapshot.
    pub fn get(&self) -> Arc<T> {
        self.0.load_full()
    }

    /// Replace the current snapshot. Writer side only.
    pub fn publish(&self, value: T) {
        self.0.store(Arc::new(value));
    }
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
