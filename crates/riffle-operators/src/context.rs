//! Execution context passed down the executor tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::OpError;

/// Carries the cancellation signal for one query execution.
///
/// Operators check it at upstream-fetch boundaries; a set flag surfaces as
/// `OpError::Cancelled` from the current `next` call.
#[derive(Clone, Default)]
pub struct ExecContext {
    cancelled: Arc<AtomicBool>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that an external party (session, scheduler) can trip.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check_cancelled(&self) -> Result<(), OpError> {
        if self.is_cancelled() {
            Err(OpError::Cancelled)
        } else {
            Ok(())
        }
    }
}
