//! Cooperative cancellation for long traversals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable cancellation flag checked between expansion steps.
///
/// Cancellation is cooperative: a cancelled traversal stops expanding
/// and returns the partial result with a warning — it is not an error,
/// and the depth-bound contract is unchanged.
///
/// # Example
///
/// ```rust,ignore
/// let token = CancelToken::new();
/// let opts = ExecuteOptions {
///     cancel: Some(token.clone()),
///     ..Default::default()
/// };
/// // ... from another thread:
/// token.cancel();
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
