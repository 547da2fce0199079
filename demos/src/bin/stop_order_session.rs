//! Example walking through a single-threaded broker session
//!
//! This example shows how to:
//! 1. Wire a broker to the simulated exchange and an in-memory account store
//! 2. Hold market orders until the exchange opens
//! 3. Arm stop orders and watch a price move trigger them
//! 4. Read the settled balance and close the broker

use broker_rs::prelude::*;
use std::sync::Arc;
use tracing::info;

fn print_account(broker: &Broker, name: &str, password: &str) -> Result<(), BrokerError> {
    let account = broker.get_account(name, password)?;
    info!(
        "{} balance: {}.{:02}",
        account.name(),
        account.balance() / 100,
        account.balance().rem_euclid(100)
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting stop order session example");

    let exchange = Arc::new(SimulatedExchange::with_quotes(&[
        ("BA", 12_000),
        ("F", 1_150),
        ("GE", 9_000),
    ]));
    let accounts = Arc::new(InMemoryAccountManager::new());
    let broker = Broker::new("session-desk", exchange.clone(), accounts, QueueStrategy::Inline)?;
    info!("Tracking symbols: {:?}", broker.symbols());

    broker.create_account("neotheone", "redpill", 1_000_000)?;
    print_account(&broker, "neotheone", "redpill")?;

    // Market orders placed while closed are held
    broker.place_order(Order::market_buy("neotheone", "F", 100)?)?;
    info!("Pending market orders: {}", broker.pending_market_orders().len());

    exchange.open();
    info!("Executed trades after open: {}", exchange.executed_trades().len());
    print_account(&broker, "neotheone", "redpill")?;

    // Protect the position and arm a breakout buy
    broker.place_order(Order::stop_sell("neotheone", "F", 100, 1_100)?)?;
    broker.place_order(Order::stop_buy("neotheone", "BA", 5, 12_500)?)?;

    match broker.place_order(Order::stop_buy("neotheone", "ZZZZ", 1, 100)?) {
        Err(BrokerError::UnknownSymbol(ticker)) => info!("Rejected order on {}", ticker),
        other => info!("Unexpected result: {:?}", other),
    }

    for (ticker, price) in [("F", 1_120), ("BA", 12_600), ("F", 1_090)] {
        info!("{} moves to {}", ticker, price);
        exchange.set_price(ticker, price);
    }

    for trade in exchange.executed_trades() {
        info!(
            "Trade {}: {} {} x {} @ {}",
            trade.order_id, trade.side, trade.quantity, trade.ticker, trade.price
        );
    }
    print_account(&broker, "neotheone", "redpill")?;

    broker.close()?;
    info!("Broker state: {}", broker.state());
    Ok(())
}
