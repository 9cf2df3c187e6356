//! Cooperative cancellation for render calls
//!
//! A render checks its token before every pass and races every retrieval
//! against it, so a cancelled render stops at the next await point instead of
//! running to completion.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A cancellation token for render calls.
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Examples
///
/// ```rust
/// use acton_compose::cancellation::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let token = CancellationToken::new();
///     let remote = token.clone();
///
///     remote.cancel();
///
///     assert!(token.is_cancelled());
///     token.cancelled().await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            state: Arc::new(CancellationState { tx, rx }),
        }
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.rx.borrow()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        let _ = self.state.tx.send(true);
        debug!("Render cancellation requested");
    }

    /// Wait for cancellation signal.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Run a future unless the token is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled)` if the token fired before the future finished.
    pub async fn run_until_cancelled<F, T>(&self, future: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Cancelled),
            result = future => Ok(result),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Marker returned when a token fired before a future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;
