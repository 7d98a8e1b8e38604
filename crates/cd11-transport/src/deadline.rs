//! Deadline predicates for [`FrameReader`](crate::FrameReader).
//!
//! A deadline is any `Fn() -> bool` that turns true once the caller's time
//! budget is spent. The reader re-checks it between reads; there is no
//! other cancellation channel, so early shutdown is expressed by folding a
//! cancellation flag into the predicate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Expires `budget` after the call. Follows the Tokio clock, so paused
/// test time applies.
pub fn after(budget: Duration) -> impl Fn() -> bool + Send + Sync {
    let expires_at = Instant::now() + budget;
    move || Instant::now() >= expires_at
}

/// Never expires.
pub fn never() -> impl Fn() -> bool + Send + Sync {
    || false
}

/// Expires when `deadline` does or when `cancelled` is set.
pub fn or_cancelled(
    deadline: impl Fn() -> bool + Send + Sync,
    cancelled: Arc<AtomicBool>,
) -> impl Fn() -> bool + Send + Sync {
    move || cancelled.load(Ordering::Acquire) || deadline()
}
