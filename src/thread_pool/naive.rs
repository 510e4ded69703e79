use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::error;

use super::ThreadPool;
use crate::Result;

/// a simple thread-pool that is not actually a pool. It starts a new, named thread on every
/// spawn request
pub struct NaiveThreadPool {
    spawned: AtomicU64,
}

impl ThreadPool for NaiveThreadPool {
    /// the number of `threads` is ignored, there is no upper bound
    fn new(_threads: u32) -> Result<Self> {
        Ok(NaiveThreadPool {
            spawned: AtomicU64::new(0),
        })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = thread::Builder::new()
            .name(format!("client-{}", id))
            .spawn(job)
        {
            error!("Failed to spawn a thread: {}", e);
        }
    }
}
