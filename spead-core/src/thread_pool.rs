//! Shared worker executor for stream processing.

use std::io;

use tokio::runtime::{Builder, Handle, Runtime};

/// A set of worker threads servicing stream tasks.
///
/// Streams serialize their own state mutations through a per-stream
/// strand; the pool only provides the threads those strands run on.
/// Workers are created by the constructor and shut down when the pool is
/// dropped.
///
/// ## Example
///
/// ```rust
/// use spead_core::ThreadPool;
///
/// let pool = ThreadPool::new(2).unwrap();
/// let _handle = pool.handle();
/// ```
#[derive(Debug)]
pub struct ThreadPool {
    runtime: Runtime,
}

impl ThreadPool {
    /// Create a pool with `num_threads` worker threads (at least one).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(num_threads.max(1))
            .thread_name("spead-worker")
            .build()?;
        Ok(Self { runtime })
    }

    /// Handle for spawning tasks onto the pool.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawned_task_runs() {
        let pool = ThreadPool::new(1).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        pool.handle().spawn(async move {
            let _ = tx.send(1 + 1);
        });
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn test_zero_threads_clamped() {
        // A zero-thread pool would never run anything; clamp to one.
        let pool = ThreadPool::new(0).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        pool.handle().spawn(async move {
            let _ = tx.send(());
        });
        assert!(rx.recv().is_ok());
    }
}
