//! Fixtures shared by the broker tests.

#![allow(dead_code)]
#![cfg(test)]

use crate::account::{AccountManager, InMemoryAccountManager};
use crate::broker::engine::Broker;
use crate::broker::order::Order;
use crate::broker::queue::OrderConsumer;
use crate::broker::strategy::QueueStrategy;
use crate::exchange::SimulatedExchange;
use std::sync::{Arc, Mutex};

/// Account created by [`setup_broker`]
pub const TRADER: &str = "neotheone";
/// Password of [`TRADER`]
pub const PASSWORD: &str = "redpill";
/// Opening balance of [`TRADER`]
pub const OPENING_BALANCE: i64 = 1_000_000;

/// Consumer recording every order it receives, and the shared record.
pub fn recording_consumer<E: Send + 'static>() -> (OrderConsumer<E>, Arc<Mutex<Vec<E>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let consumer: OrderConsumer<E> = Arc::new(move |order: E| {
        sink.lock().unwrap().push(order);
        Ok(())
    });
    (consumer, seen)
}

/// Limit prices of a batch of stop orders, in the given order.
pub fn limits(orders: &[Order]) -> Vec<u64> {
    orders.iter().filter_map(Order::limit_price).collect()
}

/// Closed exchange quoting BA and F, plus HALT listed without a quote.
pub fn exchange() -> Arc<SimulatedExchange> {
    let exchange = SimulatedExchange::with_quotes(&[("BA", 12_000), ("F", 1_150)]);
    exchange.list("HALT", None);
    Arc::new(exchange)
}

/// Broker over [`exchange`] with one funded account.
pub fn setup_broker(
    strategy: QueueStrategy,
) -> (Broker, Arc<SimulatedExchange>, Arc<InMemoryAccountManager>) {
    let exchange = exchange();
    let accounts = Arc::new(InMemoryAccountManager::new());
    accounts
        .create_account(TRADER, PASSWORD, OPENING_BALANCE)
        .unwrap();
    let broker = Broker::new("test-broker", exchange.clone(), accounts.clone(), strategy).unwrap();
    (broker, exchange, accounts)
}

/// Balance of [`TRADER`] as stored by the account manager.
pub fn trader_balance(accounts: &InMemoryAccountManager) -> i64 {
    accounts.get_account(TRADER).unwrap().balance()
}
