//! Concurrency tests for the order queues: many producers, moving
//! thresholds and cascades between queues sharing one dispatcher.

use broker_rs::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const PRODUCERS: usize = 8;
const ORDERS_PER_PRODUCER: usize = 200;
const FINAL_PRICE: u64 = 500;

fn limit_for(producer: usize, index: usize) -> u64 {
    ((producer * ORDERS_PER_PRODUCER + index) as u64 * 37) % 1_000 + 1
}

fn stop_buy_queue(strategy: &QueueStrategy) -> Arc<dyn OrderQueue<u64, Order>> {
    strategy.create_queue::<u64, Order>(
        "stress stop-buy",
        0,
        Arc::new(|price: &u64, order: &Order| {
            order.limit_price().is_some_and(|limit| limit <= *price)
        }),
        Arc::new(Order::ascending_limit),
    )
}

/// Enqueue from every producer while another thread raises the threshold
/// up to [`FINAL_PRICE`]; returns every order created.
fn run_producers(queue: &Arc<dyn OrderQueue<u64, Order>>) -> Vec<Order> {
    let barrier = Arc::new(Barrier::new(PRODUCERS + 1));
    let mut handles = Vec::new();

    for producer in 0..PRODUCERS {
        let queue = Arc::clone(queue);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut created = Vec::with_capacity(ORDERS_PER_PRODUCER);
            for index in 0..ORDERS_PER_PRODUCER {
                let order =
                    Order::stop_buy("stresstest", "STRS", 1, limit_for(producer, index)).unwrap();
                assert!(queue.enqueue(order.clone()));
                created.push(order);
            }
            created
        }));
    }

    let mover_queue = Arc::clone(queue);
    let mover_barrier = Arc::clone(&barrier);
    let mover = thread::spawn(move || {
        mover_barrier.wait();
        for price in (0..=FINAL_PRICE).step_by(25) {
            mover_queue.set_threshold(price);
            thread::yield_now();
        }
    });

    let created: Vec<Order> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    mover.join().unwrap();
    // Orders enqueued after the last move are drained by their own enqueue
    queue.set_threshold(FINAL_PRICE);
    created
}

fn assert_exactly_once(created: &[Order], delivered: &[Order], queue: &Arc<dyn OrderQueue<u64, Order>>) {
    let delivered_ids: Vec<OrderId> = delivered.iter().map(Order::id).collect();
    let unique: HashSet<OrderId> = delivered_ids.iter().copied().collect();
    assert_eq!(unique.len(), delivered_ids.len(), "duplicate delivery");

    let expected: HashSet<OrderId> = created
        .iter()
        .filter(|order| order.limit_price().is_some_and(|limit| limit <= FINAL_PRICE))
        .map(Order::id)
        .collect();
    assert_eq!(unique, expected);

    let pending = queue.pending();
    assert_eq!(pending.len() + delivered.len(), PRODUCERS * ORDERS_PER_PRODUCER);
    assert!(
        pending
            .iter()
            .all(|order| order.limit_price().is_some_and(|limit| limit > FINAL_PRICE))
    );
}

fn recorder() -> (OrderConsumer<Order>, Arc<Mutex<Vec<Order>>>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let consumer: OrderConsumer<Order> = Arc::new(move |order: Order| {
        sink.lock().unwrap().push(order);
        Ok(())
    });
    (consumer, delivered)
}

#[test]
fn test_worker_queue_delivers_each_eligible_order_once() {
    let strategy = QueueStrategy::thread().unwrap();
    let queue = stop_buy_queue(&strategy);
    let (consumer, delivered) = recorder();
    queue.set_consumer(consumer);

    let created = run_producers(&queue);
    strategy.wait_idle().unwrap();

    assert_exactly_once(&created, &delivered.lock().unwrap(), &queue);
    strategy.shutdown();
}

#[test]
fn test_inline_queue_delivers_each_eligible_order_once() {
    let strategy = QueueStrategy::Inline;
    let queue = stop_buy_queue(&strategy);
    let (consumer, delivered) = recorder();
    queue.set_consumer(consumer);

    let created = run_producers(&queue);

    assert_exactly_once(&created, &delivered.lock().unwrap(), &queue);
}

#[test]
fn test_tokio_queue_delivers_each_eligible_order_once() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let strategy = QueueStrategy::tokio(runtime.handle().clone());
    let queue = stop_buy_queue(&strategy);
    let (consumer, delivered) = recorder();
    queue.set_consumer(consumer);

    let created = run_producers(&queue);
    strategy.wait_idle().unwrap();

    assert_exactly_once(&created, &delivered.lock().unwrap(), &queue);
    strategy.shutdown();
}

#[test]
fn test_worker_queue_preserves_priority_within_a_drain() {
    let dispatcher: Arc<dyn DispatchExecutor> =
        Arc::new(ThreadDispatcher::new("priority-dispatch").unwrap());
    let strategy = QueueStrategy::worker(Arc::clone(&dispatcher));
    let queue = stop_buy_queue(&strategy);
    let (consumer, delivered) = recorder();
    queue.set_consumer(consumer);

    for limit in [70, 10, 90, 30, 50] {
        queue.enqueue(Order::stop_buy("stresstest", "STRS", 1, limit).unwrap());
    }
    dispatcher.wait_idle().unwrap();
    assert!(delivered.lock().unwrap().is_empty());

    queue.set_threshold(60);
    dispatcher.wait_idle().unwrap();
    let limits: Vec<u64> = delivered
        .lock()
        .unwrap()
        .iter()
        .filter_map(Order::limit_price)
        .collect();
    assert_eq!(limits, vec![10, 30, 50]);
    dispatcher.shutdown();
}

#[test]
fn test_cascade_between_queues_on_shared_worker() {
    let strategy = QueueStrategy::thread().unwrap();
    let stops = stop_buy_queue(&strategy);
    let market = strategy.create_queue::<bool, Order>(
        "stress market",
        true,
        Arc::new(|open: &bool, _: &Order| *open),
        Arc::new(Order::natural_order),
    );
    let (consumer, executed) = recorder();
    market.set_consumer(consumer);
    let forward = Arc::clone(&market);
    stops.set_consumer(Arc::new(move |order: Order| {
        forward.enqueue(order.to_market());
        Ok(())
    }));

    let orders: Vec<Order> = (1..=50)
        .map(|limit| Order::stop_buy("stresstest", "STRS", 1, limit * 10).unwrap())
        .collect();
    for order in &orders {
        stops.enqueue(order.clone());
    }
    stops.set_threshold(250);
    strategy.wait_idle().unwrap();

    let executed = executed.lock().unwrap();
    assert_eq!(executed.len(), 25);
    assert!(executed.iter().all(|order| !order.is_stop()));
    assert_eq!(stops.len(), 25);
    strategy.shutdown();
}

#[test]
fn test_consumer_may_reenter_its_own_queue() {
    let queue = Arc::new(SimpleOrderQueue::<u64, u64>::new(
        10,
        Arc::new(|threshold: &u64, value: &u64| value <= threshold),
        Arc::new(|a: &u64, b: &u64| a.cmp(b)),
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let weak = Arc::downgrade(&queue);
    queue.set_consumer(Arc::new(move |value: u64| {
        sink.lock().unwrap().push(value);
        if let Some(queue) = weak.upgrade() {
            if value > 1 {
                queue.enqueue(value / 2);
            }
        }
        Ok(())
    }));

    queue.enqueue(8);
    assert_eq!(*seen.lock().unwrap(), vec![8, 4, 2, 1]);
    assert!(queue.is_empty());
}

/// Worker-backed queue holding stop-buys at 1, 50 and 60 whose consumer
/// rejects the order limited at 1 through `reject`.
fn queue_rejecting_first_order(
    strategy: &QueueStrategy,
    reject: fn() -> Result<(), BrokerError>,
) -> (Arc<dyn OrderQueue<u64, Order>>, Arc<Mutex<Vec<u64>>>) {
    let queue = stop_buy_queue(strategy);
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    queue.set_consumer(Arc::new(move |order: Order| -> Result<(), BrokerError> {
        let limit = order.limit_price().unwrap_or_default();
        if limit == 1 {
            return reject();
        }
        sink.lock().unwrap().push(limit);
        Ok(())
    }));
    for limit in [1, 50, 60] {
        queue.enqueue(Order::stop_buy("stresstest", "STRS", 1, limit).unwrap());
    }
    (queue, delivered)
}

fn assert_next_trigger_resumes(
    strategy: &QueueStrategy,
    queue: &Arc<dyn OrderQueue<u64, Order>>,
    delivered: &Arc<Mutex<Vec<u64>>>,
) {
    queue.set_threshold(100);
    strategy.wait_idle().unwrap();
    assert!(delivered.lock().unwrap().is_empty());
    let pending: Vec<u64> = queue.pending().iter().filter_map(Order::limit_price).collect();
    assert_eq!(pending, vec![50, 60]);

    queue.set_threshold(100);
    strategy.wait_idle().unwrap();
    assert_eq!(*delivered.lock().unwrap(), vec![50, 60]);
    assert!(queue.is_empty());
}

#[test]
fn test_worker_queue_recovers_from_panicking_consumer() {
    let strategy = QueueStrategy::thread().unwrap();
    let (queue, delivered) =
        queue_rejecting_first_order(&strategy, || panic!("exchange unreachable"));
    assert_next_trigger_resumes(&strategy, &queue, &delivered);

    // Orders placed after the failure still dispatch on their own enqueue
    queue.enqueue(Order::stop_buy("stresstest", "STRS", 1, 70).unwrap());
    strategy.wait_idle().unwrap();
    assert_eq!(*delivered.lock().unwrap(), vec![50, 60, 70]);
    strategy.shutdown();
}

#[test]
fn test_worker_queue_recovers_from_failing_consumer() {
    let strategy = QueueStrategy::thread().unwrap();
    let (queue, delivered) = queue_rejecting_first_order(&strategy, || {
        Err(BrokerError::InvalidOrder("market halted".to_string()))
    });
    assert_next_trigger_resumes(&strategy, &queue, &delivered);
    strategy.shutdown();
}

#[test]
fn test_tokio_queue_recovers_from_panicking_consumer() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let strategy = QueueStrategy::tokio(runtime.handle().clone());
    let (queue, delivered) =
        queue_rejecting_first_order(&strategy, || panic!("exchange unreachable"));
    assert_next_trigger_resumes(&strategy, &queue, &delivered);
    strategy.shutdown();
}
