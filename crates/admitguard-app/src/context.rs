use admitguard_domain::CancelToken;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Per-call cancellation and deadline, shared between async I/O and blocking evaluation.
///
/// The async side waits on [`Context::cancelled`]; the blocking side polls the
/// [`CancelToken`] returned by [`Context::token`].
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancelToken,
    // Shared by a context and all of its children so a parent's cancel wakes child waiters.
    notify: Arc<Notify>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(Some(timeout))
    }

    /// A child that is cancelled with this context, and additionally after `timeout`.
    pub fn child_with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            token: self
                .token
                .child_with_deadline(timeout.map(|t| Instant::now() + t)),
            notify: Arc::clone(&self.notify),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Resolves once this context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the check so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.token.is_cancelled() {
                return;
            }
            match self.token.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Run `fut` unless the context is cancelled first. `None` means cancelled.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let ctx = Context::new();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tokio::task::yield_now().await;
        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("woken")
            .expect("join");
    }

    #[tokio::test]
    async fn parent_cancel_reaches_children() {
        let parent = Context::new();
        let child = parent.child_with_timeout(None);
        parent.cancel();
        assert!(child.is_cancelled());
        tokio::time::timeout(Duration::from_secs(5), child.cancelled())
            .await
            .expect("child observes parent");
    }

    #[tokio::test]
    async fn deadline_resolves_cancelled() {
        let ctx = Context::with_timeout(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(5), ctx.cancelled())
            .await
            .expect("deadline fires");
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn run_until_cancelled_prefers_cancellation() {
        let ctx = Context::new();
        assert_eq!(ctx.run_until_cancelled(async { 7 }).await, Some(7));
        ctx.cancel();
        assert_eq!(ctx.run_until_cancelled(async { 7 }).await, None);
    }
}
