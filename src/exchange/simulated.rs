/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! In-process exchange used by tests and demos.

use crate::broker::order::{Order, OrderId, Side};
use crate::broker::queue::lock;
use crate::exchange::types::{
    ExchangeError, ExchangeEvent, ExchangeListener, StockExchange, StockQuote,
};
use crate::utils::current_time_millis;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, trace};

/// A trade executed by the [`SimulatedExchange`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedTrade {
    /// Identifier of the executed order
    pub order_id: OrderId,
    /// Account the order belongs to
    pub account_id: String,
    /// Ticker traded
    pub ticker: String,
    /// Buy or sell
    pub side: Side,
    /// Number of shares
    pub quantity: u32,
    /// Execution price in cents
    pub price: u64,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

/// Thread-safe exchange holding a quote per ticker and an open flag.
///
/// [`open`](SimulatedExchange::open), [`close`](SimulatedExchange::close) and
/// [`set_price`](SimulatedExchange::set_price) publish the matching
/// [`ExchangeEvent`] to every registered listener on the calling thread.
/// No internal lock is held while listeners run.
pub struct SimulatedExchange {
    quotes: DashMap<String, u64>,
    /// Listing order of the tickers
    tickers: Mutex<Vec<String>>,
    open: AtomicBool,
    listeners: Mutex<Vec<ExchangeListener>>,
    trades: Mutex<Vec<ExecutedTrade>>,
}

impl SimulatedExchange {
    /// Create a closed exchange with no listed tickers
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
            tickers: Mutex::new(Vec::new()),
            open: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            trades: Mutex::new(Vec::new()),
        }
    }

    /// Create a closed exchange listing the given `(ticker, price)` pairs
    pub fn with_quotes(quotes: &[(&str, u64)]) -> Self {
        let exchange = Self::new();
        for (ticker, price) in quotes {
            exchange.list(ticker, Some(*price));
        }
        exchange
    }

    /// List a ticker. A ticker listed without a price has no quote until
    /// [`set_price`](Self::set_price) is called. Publishes no event.
    pub fn list(&self, ticker: &str, price: Option<u64>) {
        {
            let mut tickers = lock(&self.tickers);
            if !tickers.iter().any(|t| t == ticker) {
                tickers.push(ticker.to_string());
            }
        }
        if let Some(price) = price {
            self.quotes.insert(ticker.to_string(), price);
        }
    }

    /// Open trading and publish [`ExchangeEvent::Opened`]
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        info!("exchange opened");
        self.publish(&ExchangeEvent::Opened);
    }

    /// Close trading and publish [`ExchangeEvent::Closed`]
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        info!("exchange closed");
        self.publish(&ExchangeEvent::Closed);
    }

    /// Move the price of a ticker and publish [`ExchangeEvent::PriceChanged`].
    /// Unlisted tickers are listed on the fly.
    pub fn set_price(&self, ticker: &str, price: u64) {
        self.list(ticker, Some(price));
        trace!(ticker, price, "price changed");
        self.publish(&ExchangeEvent::PriceChanged {
            ticker: ticker.to_string(),
            price,
        });
    }

    /// Trades executed so far, in execution order
    pub fn executed_trades(&self) -> Vec<ExecutedTrade> {
        lock(&self.trades).clone()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn publish(&self, event: &ExchangeEvent) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(event);
        }
    }
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl StockExchange for SimulatedExchange {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn tickers(&self) -> Vec<String> {
        lock(&self.tickers).clone()
    }

    fn quote(&self, ticker: &str) -> Option<StockQuote> {
        self.quotes
            .get(ticker)
            .map(|price| StockQuote::new(ticker, *price))
    }

    fn execute_trade(&self, order: &Order) -> Result<u64, ExchangeError> {
        if !self.is_open() {
            return Err(ExchangeError::Closed);
        }
        let price = self
            .quotes
            .get(order.ticker())
            .map(|price| *price)
            .ok_or_else(|| ExchangeError::UnknownSymbol(order.ticker().to_string()))?;

        let trade = ExecutedTrade {
            order_id: order.id(),
            account_id: order.account_id().to_string(),
            ticker: order.ticker().to_string(),
            side: order.side(),
            quantity: order.quantity(),
            price,
            timestamp: current_time_millis(),
        };
        info!(order_id = %trade.order_id, ticker = %trade.ticker, side = %trade.side, quantity = trade.quantity, price, "trade executed");
        lock(&self.trades).push(trade);
        Ok(price)
    }

    fn add_listener(&self, listener: ExchangeListener) {
        lock(&self.listeners).push(listener);
    }

    fn remove_listener(&self, listener: &ExchangeListener) {
        lock(&self.listeners).retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}
