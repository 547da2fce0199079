/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Per-symbol stop order management.
//!
//! An [`OrderManager`] owns the stop-buy and stop-sell queues of one ticker.
//! Both queues use the ticker's last known price as their threshold:
//!
//! - stop-buy orders dispatch when `limit_price <= price`, lowest limit first
//! - stop-sell orders dispatch when `limit_price >= price`, highest limit first
//!
//! Orders sharing a limit price dispatch in creation order.

use crate::broker::error::BrokerError;
use crate::broker::order::{Order, OrderKind};
use crate::broker::queue::{OrderConsumer, OrderQueue};
use crate::broker::strategy::QueueStrategy;
use std::sync::Arc;
use tracing::{info, trace};

/// Stop order queues for a single ticker symbol.
pub struct OrderManager {
    symbol: String,
    stop_buy_orders: Arc<dyn OrderQueue<u64, Order>>,
    stop_sell_orders: Arc<dyn OrderQueue<u64, Order>>,
}

impl OrderManager {
    /// Create a manager with sequential queues
    pub fn new(symbol: &str, price: u64) -> Self {
        Self::with_strategy(symbol, price, &QueueStrategy::Inline)
    }

    /// Create a manager whose queues are built by `strategy`
    pub fn with_strategy(symbol: &str, price: u64, strategy: &QueueStrategy) -> Self {
        let stop_buy_orders = strategy.create_queue::<u64, Order>(
            &format!("{symbol} stop-buy"),
            price,
            Arc::new(|price: &u64, order: &Order| {
                order.limit_price().is_some_and(|limit| limit <= *price)
            }),
            Arc::new(Order::ascending_limit),
        );
        let stop_sell_orders = strategy.create_queue::<u64, Order>(
            &format!("{symbol} stop-sell"),
            price,
            Arc::new(|price: &u64, order: &Order| {
                order.limit_price().is_some_and(|limit| limit >= *price)
            }),
            Arc::new(Order::descending_limit),
        );
        info!(ticker = %symbol, price, "order manager created");

        Self {
            symbol: symbol.to_string(),
            stop_buy_orders,
            stop_sell_orders,
        }
    }

    /// The ticker symbol managed
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last price applied to the stop-buy queue
    pub fn current_price(&self) -> u64 {
        self.stop_buy_orders.threshold()
    }

    /// Apply a new market price to both queues.
    ///
    /// The stop-buy queue is updated before the stop-sell queue; the two
    /// updates are not atomic with respect to each other.
    pub fn adjust_price(&self, price: u64) {
        trace!(ticker = %self.symbol, price, "adjusting price");
        self.stop_buy_orders.set_threshold(price);
        self.stop_sell_orders.set_threshold(price);
    }

    /// Queue a stop order on the matching side.
    ///
    /// # Errors
    ///
    /// `InvalidOrder` for a market order or an order on another ticker.
    pub fn queue_order(&self, order: Order) -> Result<(), BrokerError> {
        if order.ticker() != self.symbol {
            return Err(BrokerError::InvalidOrder(format!(
                "order {} is for {}, not {}",
                order.id(),
                order.ticker(),
                self.symbol
            )));
        }
        let queue = match order.kind() {
            OrderKind::StopBuy { .. } => &self.stop_buy_orders,
            OrderKind::StopSell { .. } => &self.stop_sell_orders,
            OrderKind::MarketBuy | OrderKind::MarketSell => {
                return Err(BrokerError::InvalidOrder(format!(
                    "order {} is not a stop order",
                    order.id()
                )));
            }
        };
        trace!(ticker = %self.symbol, order_id = %order.id(), kind = %order.kind(), "queueing stop order");
        queue.enqueue(order);
        Ok(())
    }

    /// Register the consumer receiving dispatched stop-buy orders
    pub fn set_buy_order_processor(&self, processor: OrderConsumer<Order>) {
        self.stop_buy_orders.set_consumer(processor);
    }

    /// Register the consumer receiving dispatched stop-sell orders
    pub fn set_sell_order_processor(&self, processor: OrderConsumer<Order>) {
        self.stop_sell_orders.set_consumer(processor);
    }

    /// Queued stop-buy orders in dispatch priority
    pub fn pending_buy_orders(&self) -> Vec<Order> {
        self.stop_buy_orders.pending()
    }

    /// Queued stop-sell orders in dispatch priority
    pub fn pending_sell_orders(&self) -> Vec<Order> {
        self.stop_sell_orders.pending()
    }

    /// Total number of queued stop orders
    pub fn pending_count(&self) -> usize {
        self.stop_buy_orders.len() + self.stop_sell_orders.len()
    }
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("symbol", &self.symbol)
            .field("price", &self.current_price())
            .field("stop_buy_orders", &self.stop_buy_orders.len())
            .field("stop_sell_orders", &self.stop_sell_orders.len())
            .finish()
    }
}
