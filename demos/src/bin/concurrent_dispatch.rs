//! Example running a price feed and several clients against a broker whose
//! queues drain on a dedicated dispatcher thread.

use broker_rs::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const TICKERS: [(&str, u64); 3] = [("BA", 12_000), ("F", 1_150), ("GE", 9_000)];
const CLIENTS: [&str; 3] = ["client001", "client002", "client003"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let exchange = Arc::new(SimulatedExchange::with_quotes(&TICKERS));
    let accounts = Arc::new(InMemoryAccountManager::new());
    let config = BrokerConfig::new("threaded-desk").with_dispatch(DispatchMode::Thread);
    let broker = Arc::new(Broker::from_config(&config, exchange.clone(), accounts.clone())?);
    for client in CLIENTS {
        broker.create_account(client, "password", 10_000_000)?;
    }
    exchange.open();

    let start = Instant::now();
    let mut handles = Vec::new();
    for (n, client) in CLIENTS.iter().enumerate() {
        let broker = Arc::clone(&broker);
        let client = client.to_string();
        handles.push(thread::spawn(move || -> Result<(), BrokerError> {
            for round in 1..=20u64 {
                for (ticker, price) in TICKERS {
                    let offset = round * 5 + n as u64;
                    broker.place_order(Order::stop_buy(&client, ticker, 1, price + offset)?)?;
                    broker.place_order(Order::stop_sell(&client, ticker, 1, price - offset)?)?;
                }
            }
            Ok(())
        }));
    }

    let feed_exchange = exchange.clone();
    let feed = thread::spawn(move || {
        for step in 0..50u64 {
            for (ticker, price) in TICKERS {
                let swing = (step % 10) * 15;
                let moved = if step % 2 == 0 { price + swing } else { price - swing };
                feed_exchange.set_price(ticker, moved);
            }
            thread::sleep(Duration::from_millis(2));
        }
    });

    for handle in handles {
        if let Ok(Err(e)) = handle.join() {
            info!("Client failed: {}", e);
        }
    }
    let _ = feed.join();
    broker.wait_for_dispatch()?;

    let pending: usize = broker
        .symbols()
        .iter()
        .filter_map(|symbol| broker.order_manager(symbol))
        .map(|manager| manager.pending_count())
        .sum();
    info!(
        "Executed {} trades in {:?}, {} stop orders still armed",
        exchange.executed_trades().len(),
        start.elapsed(),
        pending
    );
    for client in CLIENTS {
        let account = broker.get_account(client, "password")?;
        info!("{} balance: {}", account.name(), account.balance());
    }

    broker.close()?;
    Ok(())
}
