//! Cancellation signals for lock acquisition
//!
//! Acquisition waits until it wins the key or its `CancellationToken` fires.
//! There is no built-in timeout: a bounded wait is a token that cancels
//! itself, see [`cancel_after`].

use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

/// A token that is already cancelled
pub fn canceled() -> CancellationToken {
    let token = CancellationToken::new();
    token.cancel();
    token
}

/// A token cancelled by a timer task once `timeout` has elapsed.
///
/// Must be called inside a tokio runtime. The timer task lives until the
/// timeout elapses or the token is cancelled, whichever comes first; it is not
/// tied to the acquisition. With long timeouts, cancel the token once
/// `acquire` returns so idle timers do not pile up:
///
/// ```rust,ignore
/// let deadline = cancel_after(Duration::from_secs(300));
/// let result = source.acquire("job-42", ttl, &deadline).await;
/// deadline.cancel();
/// ```
pub fn cancel_after(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(timeout) => timer.cancel(),
        }
    });
    token
}
