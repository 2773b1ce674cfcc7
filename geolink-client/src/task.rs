use std::future::Future;

use tokio::task::JoinHandle;
use tracing::trace;

// Aborted on drop.
pub struct ScopedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScopedTask {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(task = name, "spawned");
        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.handle.abort();
        trace!(task = self.name, "aborted");
    }
}
