//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag polled at the top of every waitlist iteration and
/// every refinement iteration.
///
/// Cancellation is cooperative: requesting shutdown never interrupts a
/// graph mutation mid-way, so the reachability graph stays consistent
/// (if incomplete) when the run unwinds.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next poll point.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
