use crate::Result;
use core::panic::AssertUnwindSafe;
use futures_util::FutureExt;
use ohno::app_err;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

const LOG_TARGET: &str = "      pool";

/// A fixed set of workers draining a bounded queue.
///
/// Work is handed to the pool with [`submit`](Self::submit), which waits while the queue is
/// full. [`join`](Self::join) is the barrier: it closes the queue, waits until every queued
/// item has been processed and every worker has exited, then drops the work closure together
/// with anything it owns (such as the sending half of an output channel).
///
/// A panic while processing one item is logged and the worker moves on to the next item.
#[derive(Debug)]
pub struct WorkerPool<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
    workers: JoinSet<()>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start `size` workers, each running `work` on queued items one at a time.
    ///
    /// A size of zero is treated as one.
    pub fn new<F, Fut>(name: &'static str, size: usize, work: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(size.saturating_mul(2));
        let receiver = Arc::new(Mutex::new(receiver));
        let work = Arc::new(work);

        let mut workers = JoinSet::new();
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let work = Arc::clone(&work);

            let _ = workers.spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(item) = next else {
                        break;
                    };

                    if AssertUnwindSafe(work(item)).catch_unwind().await.is_err() {
                        log::error!(target: LOG_TARGET, "A {name} worker panicked while processing an item");
                    }
                }

                log::trace!(target: LOG_TARGET, "{name} worker {id} exiting");
            });
        }

        log::debug!(target: LOG_TARGET, "Started {size} {name} workers");
        Self { name, sender, workers }
    }

    /// Queue one item, waiting for room if the queue is full.
    pub async fn submit(&self, item: T) -> Result<()> {
        self.sender
            .send(item)
            .await
            .map_err(|_| app_err!("the {} pool is no longer accepting work", self.name))
    }

    /// Close the queue and wait for every worker to finish.
    pub async fn join(self) {
        let Self { name, sender, mut workers } = self;
        drop(sender);

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                log::error!(target: LOG_TARGET, "A {name} worker terminated abnormally: {e}");
            }
        }

        log::debug!(target: LOG_TARGET, "All {name} workers finished");
    }
}
