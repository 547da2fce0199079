//! Queue construction strategy supplied to the broker.

use crate::broker::concurrent::ConcurrentOrderQueue;
use crate::broker::dispatcher::{DispatchExecutor, ThreadDispatcher, TokioDispatcher};
use crate::broker::error::BrokerError;
use crate::broker::queue::{OrderComparator, OrderFilter, OrderQueue, SimpleOrderQueue};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// Default name of the dispatcher thread
pub const DEFAULT_DISPATCH_THREAD: &str = "broker-dispatch";

/// Selects which queue implementation the broker instantiates.
///
/// The worker-backed variant owns the shared dispatcher: every queue it
/// creates drains on the same worker, and [`shutdown`](QueueStrategy::shutdown)
/// stops it.
#[derive(Clone, Default)]
pub enum QueueStrategy {
    /// [`SimpleOrderQueue`]s draining on the caller's thread
    #[default]
    Inline,
    /// [`ConcurrentOrderQueue`]s draining on a shared dispatcher
    Worker(Arc<dyn DispatchExecutor>),
}

impl QueueStrategy {
    /// Sequential queues
    pub fn inline() -> Self {
        QueueStrategy::Inline
    }

    /// Worker-backed queues sharing one dedicated thread
    pub fn thread() -> Result<Self, BrokerError> {
        Ok(QueueStrategy::Worker(Arc::new(ThreadDispatcher::new(
            DEFAULT_DISPATCH_THREAD,
        )?)))
    }

    /// Worker-backed queues sharing one task on the given Tokio runtime
    pub fn tokio(runtime: tokio::runtime::Handle) -> Self {
        QueueStrategy::Worker(Arc::new(TokioDispatcher::new(runtime)))
    }

    /// Worker-backed queues sharing an existing dispatcher
    pub fn worker(dispatcher: Arc<dyn DispatchExecutor>) -> Self {
        QueueStrategy::Worker(dispatcher)
    }

    /// Build a queue of the selected kind
    pub fn create_queue<T, E>(
        &self,
        label: &str,
        threshold: T,
        filter: OrderFilter<T, E>,
        comparator: OrderComparator<E>,
    ) -> Arc<dyn OrderQueue<T, E>>
    where
        T: Clone + Debug + Send + 'static,
        E: Clone + Debug + Send + 'static,
    {
        match self {
            QueueStrategy::Inline => {
                Arc::new(SimpleOrderQueue::new(threshold, filter, comparator).with_label(label))
            }
            QueueStrategy::Worker(dispatcher) => Arc::new(ConcurrentOrderQueue::labelled(
                label,
                threshold,
                filter,
                comparator,
                Arc::clone(dispatcher),
            )),
        }
    }

    /// Whether drains run off the caller's thread
    pub fn is_worker_backed(&self) -> bool {
        matches!(self, QueueStrategy::Worker(_))
    }

    /// Block until the shared dispatcher has no outstanding drains.
    /// No-op for inline queues.
    ///
    /// # Errors
    ///
    /// `Configuration` when the dispatcher cannot block the calling thread.
    pub fn wait_idle(&self) -> Result<(), BrokerError> {
        match self {
            QueueStrategy::Inline => Ok(()),
            QueueStrategy::Worker(dispatcher) => dispatcher.wait_idle(),
        }
    }

    /// Stop the shared dispatcher. No-op for inline queues.
    pub fn shutdown(&self) {
        if let QueueStrategy::Worker(dispatcher) = self {
            dispatcher.shutdown();
        }
    }
}

impl fmt::Debug for QueueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStrategy::Inline => write!(f, "Inline"),
            QueueStrategy::Worker(dispatcher) => f
                .debug_struct("Worker")
                .field("running", &dispatcher.is_running())
                .field("pending_jobs", &dispatcher.pending_jobs())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_queue(strategy: &QueueStrategy) -> Arc<dyn OrderQueue<bool, u32>> {
        strategy.create_queue::<bool, u32>(
            "market",
            true,
            Arc::new(|open: &bool, _: &u32| *open),
            Arc::new(|a: &u32, b: &u32| a.cmp(b)),
        )
    }

    #[test]
    fn test_inline_strategy_builds_sequential_queue() {
        let strategy = QueueStrategy::default();
        assert!(!strategy.is_worker_backed());
        let queue = make_queue(&strategy);
        queue.enqueue(1);
        // Drained inline with no consumer
        assert!(queue.is_empty());
        strategy.wait_idle().unwrap();
        strategy.shutdown();
    }

    #[test]
    fn test_thread_strategy_builds_worker_queue() {
        let strategy = QueueStrategy::thread().unwrap();
        assert!(strategy.is_worker_backed());
        let queue = make_queue(&strategy);
        queue.set_threshold(false);
        queue.enqueue(7);
        strategy.wait_idle().unwrap();
        assert_eq!(queue.pending(), vec![7]);
        strategy.shutdown();
        assert!(format!("{strategy:?}").contains("running: false"));
    }
}
