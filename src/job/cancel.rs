//! Cooperative cancellation
//!
//! Jobs check their token at safe points (before starting, before each I/O
//! chunk, before metadata writes) and bail out with
//! [`TransferError::Cancelled`]. Nothing is interrupted preemptively.

use crate::error::{Result, TransferError};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token shared between a job and whoever may cancel it
///
/// Clones share the same state, so one token can be handed to every job of
/// a copy operation and cancelled once.
///
/// # Example
///
/// ```
/// use jobcopy::job::CancellationToken;
///
/// let token = CancellationToken::new();
/// let job_token = token.clone();
///
/// token.cancel();
/// assert!(job_token.is_cancelled());
/// assert!(job_token.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if `cancel()` was called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`TransferError::Cancelled`] once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }
}
