//! Exchange collaborator contract consumed by the broker.

use crate::broker::order::Order;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current price of a ticker, in cents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockQuote {
    /// The ticker symbol
    pub ticker: String,
    /// Last known price in cents
    pub price: u64,
}

impl StockQuote {
    /// Create a new quote
    pub fn new(ticker: &str, price: u64) -> Self {
        Self {
            ticker: ticker.to_string(),
            price,
        }
    }
}

/// Market events published by an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    /// Trading opened
    Opened,
    /// Trading closed
    Closed,
    /// The price of a ticker moved
    PriceChanged {
        /// Ticker whose price changed
        ticker: String,
        /// New price in cents
        price: u64,
    },
}

/// Exchange event listener specification using Arc for shared ownership.
///
/// Listeners may be invoked from any thread, including one other than the
/// thread executing trades.
pub type ExchangeListener = Arc<dyn Fn(&ExchangeEvent) + Send + Sync>;

/// Errors reported by an exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The exchange does not list the ticker or has no price for it
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The exchange is closed for trading
    #[error("exchange is closed")]
    Closed,
}

/// The stock exchange the broker executes against
pub trait StockExchange: Send + Sync {
    /// Whether trading is open
    fn is_open(&self) -> bool;

    /// All tradable tickers
    fn tickers(&self) -> Vec<String>;

    /// Current quote for a ticker, if one is available
    fn quote(&self, ticker: &str) -> Option<StockQuote>;

    /// Execute the order at the current market price, returning the
    /// execution price in cents
    fn execute_trade(&self, order: &Order) -> Result<u64, ExchangeError>;

    /// Register a listener for exchange events
    fn add_listener(&self, listener: ExchangeListener);

    /// Unregister a listener previously passed to `add_listener`.
    /// Listeners are matched by identity.
    fn remove_listener(&self, listener: &ExchangeListener);
}
