//! Order dispatch: queues, per-symbol managers and the broker that wires them
//! to an exchange and an account store.

/// Broker configuration loaded from JSON.
pub mod config;
pub mod concurrent;
/// Shared workers that run queue drains off the caller's thread.
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod manager;
pub mod order;
pub mod queue;
/// Factory selecting sequential or worker-backed queues.
pub mod strategy;
mod tests;

pub use concurrent::ConcurrentOrderQueue;
pub use config::{BrokerConfig, DispatchMode};
pub use dispatcher::{DispatchExecutor, DispatchJob, ThreadDispatcher, TokioDispatcher};
pub use engine::{Broker, BrokerState};
pub use error::BrokerError;
pub use manager::OrderManager;
pub use order::{Order, OrderId, OrderKind, Side};
pub use queue::{OrderComparator, OrderConsumer, OrderFilter, OrderQueue, SimpleOrderQueue};
pub use strategy::QueueStrategy;
