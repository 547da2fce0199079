//! # Brokerage Order Dispatch Core
//!
//! A thread-safe order dispatch engine for a simulated brokerage. It holds pending conditional orders (stop orders armed at a price, market orders waiting for the exchange to open) and releases each one for execution exactly when the market makes it eligible, in strict priority order.
//!
//! ## Key Features
//!
//! - **Ordered Dispatch Queues**: Orders are kept sorted by a caller-supplied comparator and released against a mutable threshold. Only the head is ever tested, so dispatch is always in comparator order, never arrival order.
//!
//! - **Cascading Dispatch**: A triggered stop order becomes a market order that is re-queued on the broker's market queue, which may execute it immediately.
//!
//! - **Two Execution Models**: Queues drain inline on the caller's thread, or on a shared worker (a dedicated thread or a task on a Tokio runtime) so exchange event threads never block on order execution.
//!
//! - **Per-Symbol Managers**: Every listed ticker gets its own stop-buy and stop-sell queues; tickers proceed independently with no broker-wide lock.
//!
//! - **Settlement**: Executed trades are reflected into the owning account. A settlement failure is logged and never rolls back the exchange trade.
//!
//! ## Dispatch Rules
//!
//! | Queue | Threshold | Eligible when | Priority |
//! |-------|-----------|---------------|----------|
//! | market | exchange open flag | exchange is open | creation order |
//! | stop-buy | last price | `limit_price <= price` | ascending limit |
//! | stop-sell | last price | `limit_price >= price` | descending limit |
//!
//! Orders sharing a limit price dispatch in creation order.
//!
//! ## Usage
//!
//! ```rust
//! use broker_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let exchange = Arc::new(SimulatedExchange::with_quotes(&[("BA", 12_000), ("F", 1_150)]));
//! let accounts = Arc::new(InMemoryAccountManager::new());
//! let broker = Broker::new("desk", exchange.clone(), accounts.clone(), QueueStrategy::thread()?)?;
//!
//! broker.create_account("trinity01", "followthewhiterabbit", 1_000_000)?;
//! broker.place_order(Order::market_buy("trinity01", "F", 100)?)?;
//! broker.place_order(Order::stop_sell("trinity01", "BA", 10, 11_500)?)?;
//!
//! // Market orders wait for the exchange to open
//! assert_eq!(broker.pending_market_orders().len(), 1);
//! exchange.open();
//! broker.wait_for_dispatch()?;
//! assert_eq!(exchange.executed_trades().len(), 1);
//!
//! // The stop-sell fires once BA falls to its limit
//! exchange.set_price("BA", 11_400);
//! broker.wait_for_dispatch()?;
//! assert_eq!(exchange.executed_trades().len(), 2);
//!
//! broker.close()?;
//! # Ok::<(), BrokerError>(())
//! ```
//!
//! ## Configuration
//!
//! [`BrokerConfig`] selects the dispatch model and can be loaded from JSON:
//!
//! ```json
//! { "name": "night-desk", "dispatch": "thread" }
//! ```
//!
//! `dispatch` is one of `inline` (default), `thread` or `tokio`. The `tokio`
//! mode must be set up from within a Tokio runtime.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber. Queue
//! mechanics log at `trace`, lifecycle at `info`, consumer and settlement
//! failures at `error`.
//!
//! ## Status
//! This project is currently in active development and is not yet suitable for production use.

pub mod account;
pub mod broker;
pub mod exchange;

pub mod prelude;
mod utils;

pub use account::{Account, AccountError, AccountManager, InMemoryAccountManager};
pub use broker::concurrent::ConcurrentOrderQueue;
pub use broker::config::{BrokerConfig, DispatchMode};
pub use broker::dispatcher::{DispatchExecutor, ThreadDispatcher, TokioDispatcher};
pub use broker::engine::{Broker, BrokerState};
pub use broker::error::BrokerError;
pub use broker::manager::OrderManager;
pub use broker::order::{Order, OrderId, OrderKind, Side};
pub use broker::queue::{OrderComparator, OrderConsumer, OrderFilter, OrderQueue, SimpleOrderQueue};
pub use broker::strategy::QueueStrategy;
pub use exchange::{
    ExchangeError, ExchangeEvent, ExchangeListener, ExecutedTrade, SimulatedExchange,
    StockExchange, StockQuote,
};
pub use utils::current_time_millis;
