//! Cancellation tokens for thumbnail teardown.
//!
//! Teardown must make any in-flight decode's eventual completion a no-op
//! for the unit. The pipeline checks the unit's token before applying a
//! completion to displayed state; the cache write itself may still land.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag shared between a thumbnail unit and any
/// work the pipeline has in flight for it.
///
/// Clones share the same underlying state. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Return to the non-cancelled state.
    ///
    /// Used when a unit's render key changes and the unit is reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
