use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Runs fan-out batches of independent tasks with a fixed ceiling on how
/// many are in flight at once.
///
/// Every task is spawned up front but only starts its work after taking a
/// permit, so at most `ceiling` tasks are active at any instant. Results are
/// handed back once the whole batch has joined, in completion order.
#[derive(Clone, Debug)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    ceiling: usize,
}

impl TaskPool {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Builds one task per item and waits for all of them.
    ///
    /// A task that panics is logged and contributes nothing; the rest of the
    /// batch still completes.
    pub async fn run_all<I, F, Fut, T>(&self, items: I, task: F) -> Vec<T>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut join_set: JoinSet<Option<T>> = JoinSet::new();

        for item in items {
            let permits = Arc::clone(&self.permits);
            let work = task(item);

            join_set.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("Task pool semaphore closed unexpectedly");
                        return None;
                    }
                };
                Some(work.await)
            });
        }

        let mut results = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(value)) => results.push(value),
                Ok(None) => {}
                Err(e) => warn!("Fan-out task failed: {}", e),
            }
        }

        results
    }
}
