//! Bounded-duration cancellation scope for a single command.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A child of the installer's root token that also fires after `timeout`.
///
/// Cancelling the parent cancels this scope; expiry cancels only this scope
/// and is reported through [`DeadlineToken::expired`].
pub struct DeadlineToken {
    token: CancellationToken,
    timeout: Duration,
    expired: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl DeadlineToken {
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let expired = Arc::new(AtomicBool::new(false));

        let timer = {
            let token = token.clone();
            let expired = expired.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        expired.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                }
            })
        };

        Self {
            token,
            timeout,
            expired,
            timer,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True when the scope was cancelled by its own deadline rather than by
    /// the parent.
    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for DeadlineToken {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
