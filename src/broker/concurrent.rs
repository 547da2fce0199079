//! Worker-backed order queue.

use crate::broker::dispatcher::DispatchExecutor;
use crate::broker::queue::{OrderComparator, OrderConsumer, OrderFilter, OrderQueue, QueueCore};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Order queue whose drains run on a shared [`DispatchExecutor`].
///
/// `enqueue` and `set_threshold` only hold the queue-state lock long enough
/// to apply their change, then schedule a drain and return. At most one
/// drain job per queue is waiting on the dispatcher at any time; triggers
/// arriving before it starts are folded into it.
pub struct ConcurrentOrderQueue<T, E> {
    core: Arc<QueueCore<T, E>>,
    dispatcher: Arc<dyn DispatchExecutor>,
    drain_scheduled: Arc<AtomicBool>,
}

impl<T, E> ConcurrentOrderQueue<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    /// Create an empty queue draining on `dispatcher`
    pub fn new(
        threshold: T,
        filter: OrderFilter<T, E>,
        comparator: OrderComparator<E>,
        dispatcher: Arc<dyn DispatchExecutor>,
    ) -> Self {
        Self::labelled("queue", threshold, filter, comparator, dispatcher)
    }

    /// Create an empty queue with a name used in log output
    pub fn labelled(
        label: &str,
        threshold: T,
        filter: OrderFilter<T, E>,
        comparator: OrderComparator<E>,
        dispatcher: Arc<dyn DispatchExecutor>,
    ) -> Self {
        Self {
            core: Arc::new(QueueCore::new(label, threshold, filter, comparator)),
            dispatcher,
            drain_scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name used in log output
    pub fn label(&self) -> &str {
        self.core.label()
    }

    fn schedule_drain(&self) {
        if self.drain_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = Arc::clone(&self.core);
        let scheduled = Arc::clone(&self.drain_scheduled);
        let job = Box::new(move || {
            // Cleared before draining so later triggers schedule a new pass
            scheduled.swap(false, Ordering::SeqCst);
            core.drain();
        });
        if let Err(e) = self.dispatcher.submit(job) {
            self.drain_scheduled.store(false, Ordering::SeqCst);
            error!(queue = %self.core.label(), error = %e, "unable to schedule drain");
        }
    }
}

impl<T, E> OrderQueue<T, E> for ConcurrentOrderQueue<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    fn enqueue(&self, order: E) -> bool {
        let inserted = self.core.insert(order);
        if inserted {
            self.schedule_drain();
        }
        inserted
    }

    fn dequeue(&self) -> Option<E> {
        self.core.dequeue()
    }

    fn set_threshold(&self, threshold: T) {
        self.core.store_threshold(threshold);
        self.schedule_drain();
    }

    fn threshold(&self) -> T {
        self.core.threshold()
    }

    fn set_consumer(&self, consumer: OrderConsumer<E>) {
        self.core.set_consumer(consumer);
    }

    fn len(&self) -> usize {
        self.core.len()
    }

    fn pending(&self) -> Vec<E> {
        self.core.pending()
    }
}
