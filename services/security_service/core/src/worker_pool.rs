//! Bounded fan-out executor (C16). Used to dispatch the high-risk audit
//! handler and the session-cleanup sweep without letting either grow the
//! tokio task count unboundedly.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Fire-and-forget: spawns `task` once a permit is available, releasing
    /// it on completion. Callers must not rely on the task having finished
    /// by the time `spawn` returns — that's the point.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            task.await;
        });
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn spawned_tasks_eventually_run() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            pool.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_permits() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.available_permits(), 2);

        pool.spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.available_permits(), 1);
    }
}
