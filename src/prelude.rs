/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use broker_rs::prelude::*;
//! ```

// Broker and configuration
pub use crate::broker::config::{BrokerConfig, DispatchMode};
pub use crate::broker::engine::{Broker, BrokerState};
pub use crate::broker::error::BrokerError;
pub use crate::broker::manager::OrderManager;

// Orders
pub use crate::broker::order::{Order, OrderId, OrderKind, Side};

// Queues and dispatch
pub use crate::broker::concurrent::ConcurrentOrderQueue;
pub use crate::broker::dispatcher::{DispatchExecutor, ThreadDispatcher, TokioDispatcher};
pub use crate::broker::queue::{
    OrderComparator, OrderConsumer, OrderFilter, OrderQueue, SimpleOrderQueue,
};
pub use crate::broker::strategy::QueueStrategy;

// Collaborators
pub use crate::account::{Account, AccountError, AccountManager, InMemoryAccountManager};
pub use crate::exchange::{
    ExchangeError, ExchangeEvent, ExchangeListener, ExecutedTrade, SimulatedExchange,
    StockExchange, StockQuote,
};

// Utility functions
pub use crate::utils::current_time_millis;
