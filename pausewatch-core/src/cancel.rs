use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// The single process-wide cancellation flag, threaded explicitly through
/// every orchestrator and driver call rather than reached for as a global.
/// Cloning shares the same flag; `reset` swaps in a fresh token so one
/// `Cancellation` can be reused across a discover/pause/resume sequence in
/// the CLI without a cancelled first run poisoning the next.
#[derive(Clone)]
pub struct Cancellation {
    inner: std::sync::Arc<Mutex<CancellationToken>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(CancellationToken::new())),
        }
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_cancel(&self) {
        self.inner.lock().unwrap().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().unwrap().is_cancelled()
    }

    pub fn reset(&self) {
        *self.inner.lock().unwrap() = CancellationToken::new();
    }

    /// A live handle into the current token, suitable for `tokio::select!`
    /// or for passing one layer down to a child scope via `child_token()`.
    pub fn token(&self) -> CancellationToken {
        self.inner.lock().unwrap().clone()
    }

    pub async fn cancelled(&self) {
        self.token().cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_cancel_is_visible_through_every_clone() {
        let a = Cancellation::new();
        let b = a.clone();
        assert!(!a.is_cancelled());
        b.request_cancel();
        assert!(a.is_cancelled());
    }

    #[tokio::test]
    async fn reset_clears_a_cancelled_flag() {
        let c = Cancellation::new();
        c.request_cancel();
        assert!(c.is_cancelled());
        c.reset();
        assert!(!c.is_cancelled());
    }
}
