//! Cooperative cancellation for long-running session operations.
//!
//! One reusable token per in-flight top-level operation. Operations select
//! on the token at every suspension point and return a cancelled outcome,
//! never an error.

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Token handed to long-running operations.
pub type OperationToken = CancellationToken;

/// Outcome of a cancellation-aware await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelAware<T> {
    Value(T),
    Cancelled,
}

impl<T> CancelAware<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Await `fut` unless `token` is cancelled first.
pub async fn await_or_cancel<T, F>(token: &OperationToken, fut: F) -> CancelAware<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        _ = token.cancelled() => CancelAware::Cancelled,
        value = fut => CancelAware::Value(value),
    }
}

/// Single-slot controller for the session's current top-level operation.
///
/// `current()` hands out the live token, rotating in a fresh one after a
/// cancel. `cancel()` aborts the live token; a second call is a no-op until
/// the next rotation.
#[derive(Debug, Default)]
pub struct OperationController {
    token: Mutex<CancellationToken>,
}

impl OperationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current non-aborted token, creating a fresh one if the previous
    /// operation was cancelled.
    pub fn current(&self) -> OperationToken {
        let mut guard = self.token.lock().expect("cancellation lock poisoned");
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
        guard.clone()
    }

    /// Abort the current token. Idempotent between rotations.
    pub fn cancel(&self) {
        let guard = self.token.lock().expect("cancellation lock poisoned");
        guard.cancel();
    }

    /// Whether the current token is aborted (and not yet rotated).
    pub fn is_cancelled(&self) -> bool {
        self.token
            .lock()
            .expect("cancellation lock poisoned")
            .is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn await_or_cancel_returns_value_when_live() {
        let controller = OperationController::new();
        let token = controller.current();
        let out = await_or_cancel(&token, async { 42usize }).await;
        assert_eq!(out, CancelAware::Value(42));
    }

    #[tokio::test]
    async fn await_or_cancel_resolves_on_cancel() {
        let controller = OperationController::new();
        let token = controller.current();
        let handle = tokio::spawn(async move {
            await_or_cancel(&token, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                7usize
            })
            .await
        });

        controller.cancel();
        let out = timeout(Duration::from_millis(300), handle)
            .await
            .expect("should resolve quickly after cancellation")
            .expect("task should not panic");
        assert_eq!(out, CancelAware::Cancelled);
    }

    #[test]
    fn cancel_twice_is_a_noop() {
        let controller = OperationController::new();
        let token = controller.current();
        controller.cancel();
        controller.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn current_rotates_after_cancel() {
        let controller = OperationController::new();
        let first = controller.current();
        controller.cancel();
        assert!(first.is_cancelled());

        let second = controller.current();
        assert!(!second.is_cancelled());
        // The rotated token is independent of the aborted one.
        controller.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn current_reuses_live_token() {
        let controller = OperationController::new();
        let a = controller.current();
        let b = controller.current();
        controller.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
