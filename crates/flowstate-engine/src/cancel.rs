//! Execution cancellation.
//!
//! A linked handle/token pair over a watch channel. The engine observes the
//! token between states and races it against waits and task invocations, so
//! cancellation is visible at the next state boundary at the latest.

use std::sync::Arc;
use tokio::sync::watch;

/// Create a linked cancellation handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

/// Cancels the linked execution.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed by the engine between states and during suspensions.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never be cancelled.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pend forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Handle dropped without cancelling; nothing can cancel this run now.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_observed() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await; // resolves immediately
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, token) = cancel_pair();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });

        handle.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_pends() {
        let token = CancelToken::never();
        let outcome =
            tokio::time::timeout(Duration::from_secs(60), token.cancelled()).await;
        assert!(outcome.is_err());
    }
}
