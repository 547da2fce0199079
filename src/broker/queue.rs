/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Ordered dispatch queues.
//!
//! An order queue holds pending orders sorted by a caller-supplied
//! comparator, a mutable threshold and a dispatch filter deciding whether
//! the head of the queue is eligible against that threshold. Whenever an
//! order is inserted or the threshold changes the queue is drained: the
//! head is removed and handed to the registered consumer for as long as it
//! passes the filter.
//!
//! Only the head is ever tested. Comparator and filter must be chosen so
//! that eligibility is monotonic along the comparator order, otherwise an
//! eligible order can sit behind an ineligible one.
//!
//! Two implementations share the same core:
//!
//! - [`SimpleOrderQueue`] drains on the caller's thread.
//! - [`ConcurrentOrderQueue`](crate::broker::concurrent::ConcurrentOrderQueue)
//!   hands drains to a shared dispatcher.

use crate::broker::error::BrokerError;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, trace, warn};

/// Dispatch predicate: `(threshold, order) -> eligible`
pub type OrderFilter<T, E> = Arc<dyn Fn(&T, &E) -> bool + Send + Sync>;

/// Priority ordering of a queue. Orders comparing equal are duplicates.
pub type OrderComparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Receives every dispatched order. An error or a panic aborts the current
/// drain; the remaining orders wait for the next trigger.
pub type OrderConsumer<E> = Arc<dyn Fn(E) -> Result<(), BrokerError> + Send + Sync>;

/// Contract shared by the sequential and the worker-backed queue.
pub trait OrderQueue<T, E>: Send + Sync {
    /// Insert an order and trigger a drain.
    ///
    /// Returns `false`, leaving the queue untouched, when an order that
    /// compares equal is already queued.
    fn enqueue(&self, order: E) -> bool;

    /// Remove and return the head if it is eligible against the current
    /// threshold. Never looks past the head.
    fn dequeue(&self) -> Option<E>;

    /// Replace the threshold and trigger a drain.
    fn set_threshold(&self, threshold: T);

    /// The current threshold.
    fn threshold(&self) -> T;

    /// Register the consumer. Last write wins.
    fn set_consumer(&self, consumer: OrderConsumer<E>);

    /// Number of queued orders.
    fn len(&self) -> usize;

    /// Whether no orders are queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queued orders in dispatch priority.
    fn pending(&self) -> Vec<E>;
}

/// Recover a guard from a poisoned lock.
///
/// Consumers never run while queue state is locked, so a panic cannot leave
/// the state half-updated.
pub(crate) fn lock<X>(mutex: &Mutex<X>) -> MutexGuard<'_, X> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases drain ownership on every exit path, unwinding included.
struct DrainOwnership<'a>(&'a AtomicBool);

impl Drop for DrainOwnership<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::SeqCst);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "consumer panicked".to_string())
}

struct QueueState<T, E> {
    orders: VecDeque<E>,
    threshold: T,
}

/// State and drain loop shared by both queue implementations.
pub(crate) struct QueueCore<T, E> {
    label: String,
    state: Mutex<QueueState<T, E>>,
    filter: OrderFilter<T, E>,
    comparator: OrderComparator<E>,
    consumer: Mutex<Option<OrderConsumer<E>>>,
    /// Set while some thread owns the drain loop
    draining: AtomicBool,
}

impl<T, E> QueueCore<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    pub(crate) fn new(
        label: &str,
        threshold: T,
        filter: OrderFilter<T, E>,
        comparator: OrderComparator<E>,
    ) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(QueueState {
                orders: VecDeque::new(),
                threshold,
            }),
            filter,
            comparator,
            consumer: Mutex::new(None),
            draining: AtomicBool::new(false),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// Sorted insert; `false` if an equal order is present.
    pub(crate) fn insert(&self, order: E) -> bool {
        let mut state = lock(&self.state);
        match state
            .orders
            .binary_search_by(|queued| (self.comparator)(queued, &order))
        {
            Ok(_) => {
                debug!(queue = %self.label, ?order, "duplicate order ignored");
                false
            }
            Err(position) => {
                trace!(queue = %self.label, ?order, position, "order queued");
                state.orders.insert(position, order);
                true
            }
        }
    }

    pub(crate) fn dequeue(&self) -> Option<E> {
        let mut state = lock(&self.state);
        let eligible = match state.orders.front() {
            Some(head) => (self.filter)(&state.threshold, head),
            None => false,
        };
        if eligible {
            state.orders.pop_front()
        } else {
            None
        }
    }

    fn head_is_eligible(&self) -> bool {
        let state = lock(&self.state);
        state
            .orders
            .front()
            .is_some_and(|head| (self.filter)(&state.threshold, head))
    }

    pub(crate) fn store_threshold(&self, threshold: T) {
        let mut state = lock(&self.state);
        trace!(queue = %self.label, ?threshold, "threshold updated");
        state.threshold = threshold;
    }

    pub(crate) fn threshold(&self) -> T {
        lock(&self.state).threshold.clone()
    }

    pub(crate) fn set_consumer(&self, consumer: OrderConsumer<E>) {
        *lock(&self.consumer) = Some(consumer);
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.state).orders.len()
    }

    pub(crate) fn pending(&self) -> Vec<E> {
        lock(&self.state).orders.iter().cloned().collect()
    }

    /// Dispatch every eligible order, returning how many left the queue.
    ///
    /// Only one thread runs the loop at a time. A caller that finds the loop
    /// owned returns immediately; the owner re-checks the head after
    /// releasing ownership, so its change is still picked up.
    pub(crate) fn drain(&self) -> usize {
        let mut dispatched = 0;
        loop {
            if self
                .draining
                .compare_exchange(false, true, AtomicOrdering::SeqCst, AtomicOrdering::SeqCst)
                .is_err()
            {
                return dispatched;
            }

            let completed = {
                let _ownership = DrainOwnership(&self.draining);
                self.drain_cycle(&mut dispatched)
            };

            if !completed || !self.head_is_eligible() {
                if dispatched > 0 {
                    debug!(queue = %self.label, dispatched, "drain finished");
                }
                return dispatched;
            }
        }
    }

    /// One pass of the loop. `false` if a consumer failed.
    fn drain_cycle(&self, dispatched: &mut usize) -> bool {
        while let Some(order) = self.dequeue() {
            *dispatched += 1;
            // Cloned so the consumer runs with no lock held
            let consumer = lock(&self.consumer).clone();
            match consumer {
                Some(consumer) => {
                    if let Err(failure) = Self::consume(&consumer, order) {
                        error!(queue = %self.label, error = %failure, "drain aborted");
                        return false;
                    }
                }
                None => {
                    warn!(queue = %self.label, ?order, "no consumer registered, dispatched order dropped");
                }
            }
        }
        true
    }

    /// Run the consumer, reporting an error or a panic as `ConsumerFailure`.
    fn consume(consumer: &OrderConsumer<E>, order: E) -> Result<(), BrokerError> {
        match panic::catch_unwind(AssertUnwindSafe(|| consumer(order))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(BrokerError::ConsumerFailure(message))) => {
                Err(BrokerError::ConsumerFailure(message))
            }
            Ok(Err(e)) => Err(BrokerError::ConsumerFailure(e.to_string())),
            Err(payload) => Err(BrokerError::ConsumerFailure(panic_message(&*payload))),
        }
    }
}

/// Order queue that drains on the calling thread.
///
/// `enqueue` and `set_threshold` return once the cascade they trigger is
/// exhausted, unless another thread is already draining the queue, in which
/// case that thread dispatches on their behalf.
///
/// # Examples
///
/// ```
/// use broker_rs::broker::queue::{OrderQueue, SimpleOrderQueue};
/// use std::sync::{Arc, Mutex};
///
/// let queue = SimpleOrderQueue::<u64, u64>::new(
///     100,
///     Arc::new(|threshold: &u64, price: &u64| price <= threshold),
///     Arc::new(|a: &u64, b: &u64| a.cmp(b)),
/// );
/// let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// queue.set_consumer(Arc::new(move |price: u64| {
///     sink.lock().unwrap().push(price);
///     Ok(())
/// }));
///
/// queue.enqueue(90);
/// queue.enqueue(105);
/// queue.enqueue(95);
///
/// assert_eq!(*seen.lock().unwrap(), vec![90, 95]);
/// assert_eq!(queue.pending(), vec![105]);
/// ```
pub struct SimpleOrderQueue<T, E> {
    core: QueueCore<T, E>,
}

impl<T, E> SimpleOrderQueue<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    /// Create an empty queue
    pub fn new(threshold: T, filter: OrderFilter<T, E>, comparator: OrderComparator<E>) -> Self {
        Self {
            core: QueueCore::new("queue", threshold, filter, comparator),
        }
    }

    /// Create an empty queue ordered by the natural ordering of `E`
    pub fn with_natural_order(threshold: T, filter: OrderFilter<T, E>) -> Self
    where
        E: Ord,
    {
        Self::new(threshold, filter, Arc::new(|a: &E, b: &E| a.cmp(b)))
    }

    /// Name used in log output
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_label(mut self, label: &str) -> Self {
        self.core.set_label(label);
        self
    }

    /// Name used in log output
    pub fn label(&self) -> &str {
        self.core.label()
    }
}

impl<T, E> OrderQueue<T, E> for SimpleOrderQueue<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    fn enqueue(&self, order: E) -> bool {
        let inserted = self.core.insert(order);
        if inserted {
            self.core.drain();
        }
        inserted
    }

    fn dequeue(&self) -> Option<E> {
        self.core.dequeue()
    }

    fn set_threshold(&self, threshold: T) {
        self.core.store_threshold(threshold);
        self.core.drain();
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

#[cfg(test)]
mod tests {
    use super::*;

    fn price_queue(threshold: u64) -> SimpleOrderQueue<u64, u64> {
        SimpleOrderQueue::<u64, u64>::new(
            threshold,
            Arc::new(|t: &u64, p: &u64| p <= t),
            Arc::new(|a: &u64, b: &u64| a.cmp(b)),
        )
    }

    #[test]
    fn test_dequeue_empty_queue() {
        let queue = price_queue(100);
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.threshold(), 100);
    }

    #[test]
    fn test_enqueue_without_consumer_drops_eligible() {
        let queue = price_queue(100);
        assert!(queue.enqueue(50));
        assert!(queue.enqueue(150));
        assert_eq!(queue.pending(), vec![150]);
    }

    #[test]
    fn test_duplicate_under_comparator_ignored() {
        let queue = price_queue(0);
        assert!(queue.enqueue(10));
        assert!(!queue.enqueue(10));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_head_of_line_blocking() {
        // Filter that is not monotonic along the ordering: only even values pass
        let queue = SimpleOrderQueue::<bool, u64>::with_natural_order(
            false,
            Arc::new(|open: &bool, v: &u64| *open && v % 2 == 0),
        );
        queue.enqueue(1);
        queue.enqueue(2);
        queue.set_threshold(true);
        assert_eq!(queue.pending(), vec![1, 2]);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_panicking_consumer_releases_the_queue() {
        let queue = price_queue(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queue.set_consumer(Arc::new(move |price: u64| -> Result<(), BrokerError> {
            if price == 1 {
                panic!("order 1 rejected");
            }
            sink.lock().unwrap().push(price);
            Ok(())
        }));

        for price in [1, 50, 60] {
            queue.enqueue(price);
        }
        queue.set_threshold(100);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.pending(), vec![50, 60]);

        queue.set_threshold(100);
        assert_eq!(*seen.lock().unwrap(), vec![50, 60]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_consumer_failures_reported_as_consumer_failure() {
        let panicking: OrderConsumer<u64> = Arc::new(|_: u64| -> Result<(), BrokerError> {
            panic!("exchange unreachable")
        });
        let result = QueueCore::<u64, u64>::consume(&panicking, 7);
        assert!(
            matches!(result, Err(BrokerError::ConsumerFailure(ref message)) if message == "exchange unreachable")
        );

        let failing: OrderConsumer<u64> = Arc::new(|_: u64| -> Result<(), BrokerError> {
            Err(BrokerError::InvalidOrder("halted".to_string()))
        });
        let result = QueueCore::<u64, u64>::consume(&failing, 7);
        assert!(
            matches!(result, Err(BrokerError::ConsumerFailure(ref message)) if message == "invalid order: halted")
        );

        let accepting: OrderConsumer<u64> = Arc::new(|_: u64| -> Result<(), BrokerError> {
            Ok(())
        });
        assert!(QueueCore::<u64, u64>::consume(&accepting, 7).is_ok());
    }

    #[test]
    fn test_label() {
        let queue = price_queue(0).with_label("BA stop-buy");
        assert_eq!(queue.label(), "BA stop-buy");
    }
}
