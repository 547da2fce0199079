//! Stock exchange collaborator: the contract the broker consumes and an
//! in-process implementation.

/// In-process exchange for tests and demos.
pub mod simulated;
pub mod types;

pub use simulated::{ExecutedTrade, SimulatedExchange};
pub use types::{ExchangeError, ExchangeEvent, ExchangeListener, StockExchange, StockQuote};
