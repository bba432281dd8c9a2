use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

/// Liveness flag handed to a background loop.
///
/// Loops check it before every state write so that a cancelled loop that
/// has not yet reached its next await point cannot publish stale values.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A cancellable background loop bound to its owner's lifetime.
///
/// Dropping the task cancels it.
#[derive(Debug)]
pub struct PollTask {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Spawn `body` on the current tokio runtime.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Liveness) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(body(Liveness(Arc::clone(&alive))));
        Self { alive, handle }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.handle.abort();
    }
}
