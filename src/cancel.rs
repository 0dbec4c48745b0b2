//! Cooperative cancellation flag shared between a controller and a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Checked before every operation and every primitive. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before a new run starts.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
