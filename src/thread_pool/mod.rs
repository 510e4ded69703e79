//! Thread pools the server runs its client connections on.
use crate::Result;

mod naive;
mod shared_queue;

pub use self::naive::NaiveThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;

/// A pool of threads that executes jobs
pub trait ThreadPool {
    /// creates a new thread pool, immediately spawning the given number of `threads`
    ///
    /// # Errors
    /// returns an error if any thread fails to spawn
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// spawns a function into the thread pool
    ///
    /// Spawning always succeeds, but if the function panics the threadpool continues
    /// to operate with the same number of threads.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}
