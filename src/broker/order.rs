/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Order value objects routed by the broker.
//!
//! An [`Order`] is immutable once created. Prices are integer cents and
//! settlement values are signed cents: buying moves cash out of the
//! account, selling moves it in.

use crate::broker::error::BrokerError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Process-wide source of order identifiers
static NEXT_ORDER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, monotonically increasing order identifier.
///
/// Identifiers are handed out in creation order, which makes them usable as
/// the natural ordering of orders and as a tiebreaker between orders that
/// share a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(u64);

impl OrderId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        OrderId(NEXT_ORDER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw value of the identifier
    #[must_use]
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy shares, paying cash
    Buy,
    /// Sell shares, receiving cash
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// The kind of an order. Stop orders carry the limit price that arms them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Buy at market as soon as the exchange is open
    MarketBuy,
    /// Sell at market as soon as the exchange is open
    MarketSell,
    /// Buy at market once the price satisfies the limit
    StopBuy {
        /// Price in cents against which the current price is compared
        limit_price: u64,
    },
    /// Sell at market once the price satisfies the limit
    StopSell {
        /// Price in cents against which the current price is compared
        limit_price: u64,
    },
}

impl OrderKind {
    /// Side implied by the kind
    #[must_use]
    pub fn side(&self) -> Side {
        match self {
            OrderKind::MarketBuy | OrderKind::StopBuy { .. } => Side::Buy,
            OrderKind::MarketSell | OrderKind::StopSell { .. } => Side::Sell,
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::MarketBuy => write!(f, "MarketBuy"),
            OrderKind::MarketSell => write!(f, "MarketSell"),
            OrderKind::StopBuy { limit_price } => write!(f, "StopBuy@{limit_price}"),
            OrderKind::StopSell { limit_price } => write!(f, "StopSell@{limit_price}"),
        }
    }
}

/// An order placed with the broker on behalf of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    account_id: String,
    ticker: String,
    quantity: u32,
    kind: OrderKind,
}

impl Order {
    fn build(
        account_id: &str,
        ticker: &str,
        quantity: u32,
        kind: OrderKind,
    ) -> Result<Self, BrokerError> {
        if quantity == 0 {
            return Err(BrokerError::InvalidOrder(format!(
                "quantity must be positive for {kind} on {ticker}"
            )));
        }
        Ok(Self {
            id: OrderId::next(),
            account_id: account_id.to_string(),
            ticker: ticker.to_string(),
            quantity,
            kind,
        })
    }

    /// Create a market buy order
    pub fn market_buy(account_id: &str, ticker: &str, quantity: u32) -> Result<Self, BrokerError> {
        Self::build(account_id, ticker, quantity, OrderKind::MarketBuy)
    }

    /// Create a market sell order
    pub fn market_sell(
        account_id: &str,
        ticker: &str,
        quantity: u32,
    ) -> Result<Self, BrokerError> {
        Self::build(account_id, ticker, quantity, OrderKind::MarketSell)
    }

    /// Create a stop buy order armed at `limit_price` cents
    pub fn stop_buy(
        account_id: &str,
        ticker: &str,
        quantity: u32,
        limit_price: u64,
    ) -> Result<Self, BrokerError> {
        Self::build(
            account_id,
            ticker,
            quantity,
            OrderKind::StopBuy { limit_price },
        )
    }

    /// Create a stop sell order armed at `limit_price` cents
    pub fn stop_sell(
        account_id: &str,
        ticker: &str,
        quantity: u32,
        limit_price: u64,
    ) -> Result<Self, BrokerError> {
        Self::build(
            account_id,
            ticker,
            quantity,
            OrderKind::StopSell { limit_price },
        )
    }

    /// The order identifier
    #[must_use]
    #[inline]
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// The account this order settles into
    #[must_use]
    #[inline]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The ticker symbol being traded
    #[must_use]
    #[inline]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Number of shares
    #[must_use]
    #[inline]
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// The kind tag of this order
    #[must_use]
    #[inline]
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Buy or sell
    #[must_use]
    #[inline]
    pub fn side(&self) -> Side {
        self.kind.side()
    }

    /// Limit price for stop orders, `None` for market orders
    #[must_use]
    pub fn limit_price(&self) -> Option<u64> {
        match self.kind {
            OrderKind::StopBuy { limit_price } | OrderKind::StopSell { limit_price } => {
                Some(limit_price)
            }
            OrderKind::MarketBuy | OrderKind::MarketSell => None,
        }
    }

    /// Whether the order waits on a price threshold
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.limit_price().is_some()
    }

    /// Settlement amount of the order executed at `execution_price` cents.
    ///
    /// Buys are negative and sells positive, so the result can be added to
    /// an account balance directly.
    #[must_use]
    pub fn value_of_order(&self, execution_price: u64) -> i64 {
        let price = i64::try_from(execution_price).unwrap_or(i64::MAX);
        let gross = i64::from(self.quantity).saturating_mul(price);
        match self.side() {
            Side::Buy => -gross,
            Side::Sell => gross,
        }
    }

    /// Equivalent market order, keeping the identifier so priority by
    /// creation time is preserved on the market queue
    #[must_use]
    pub fn to_market(&self) -> Self {
        let kind = match self.side() {
            Side::Buy => OrderKind::MarketBuy,
            Side::Sell => OrderKind::MarketSell,
        };
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Natural ordering: creation order
    pub fn natural_order(a: &Order, b: &Order) -> Ordering {
        a.id.cmp(&b.id)
    }

    /// Stop-buy priority: lowest limit first, creation order on ties
    pub fn ascending_limit(a: &Order, b: &Order) -> Ordering {
        a.limit_price()
            .cmp(&b.limit_price())
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Stop-sell priority: highest limit first, creation order on ties
    pub fn descending_limit(a: &Order, b: &Order) -> Ordering {
        b.limit_price()
            .cmp(&a.limit_price())
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} x{} for {}",
            self.id, self.kind, self.ticker, self.quantity, self.account_id
        )
    }
}
