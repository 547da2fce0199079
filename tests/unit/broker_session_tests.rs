//! End-to-end broker sessions against the simulated exchange.

use broker_rs::prelude::*;
use std::io::Write;
use std::sync::Arc;
use std::thread;

const TICKERS: [(&str, u64); 4] = [("BA", 12_000), ("F", 1_150), ("GE", 9_000), ("T", 2_500)];

fn funded_accounts(names: &[&str]) -> Arc<InMemoryAccountManager> {
    let accounts = Arc::new(InMemoryAccountManager::new());
    for name in names {
        accounts.create_account(name, "password", 5_000_000).unwrap();
    }
    accounts
}

/// Signed value of every trade executed for `account`
fn traded_value(exchange: &SimulatedExchange, account: &str) -> i64 {
    exchange
        .executed_trades()
        .iter()
        .filter(|trade| trade.account_id == account)
        .map(|trade| {
            let value = i64::from(trade.quantity) * trade.price as i64;
            match trade.side {
                Side::Buy => -value,
                Side::Sell => value,
            }
        })
        .sum()
}

#[test]
fn test_session_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "name": "night-desk", "dispatch": "thread" }}"#).unwrap();
    let config = BrokerConfig::from_json_file(file.path()).unwrap();

    let exchange = Arc::new(SimulatedExchange::with_quotes(&TICKERS));
    let accounts = funded_accounts(&["agentsmith"]);
    let broker = Broker::from_config(&config, exchange.clone(), accounts.clone()).unwrap();
    assert_eq!(broker.name(), "night-desk");
    assert_eq!(broker.symbols(), vec!["BA", "F", "GE", "T"]);

    broker.place_order(Order::market_buy("agentsmith", "GE", 10).unwrap()).unwrap();
    broker.place_order(Order::stop_buy("agentsmith", "T", 40, 2_600).unwrap()).unwrap();
    broker.place_order(Order::stop_sell("agentsmith", "GE", 10, 8_500).unwrap()).unwrap();
    broker.wait_for_dispatch().unwrap();
    assert!(exchange.executed_trades().is_empty());

    exchange.open();
    broker.wait_for_dispatch().unwrap();
    exchange.set_price("T", 2_650);
    exchange.set_price("GE", 8_400);
    broker.wait_for_dispatch().unwrap();

    let trades = exchange.executed_trades();
    assert_eq!(trades.len(), 3);
    let balance = broker.get_account("agentsmith", "password").unwrap().balance();
    assert_eq!(balance, 5_000_000 + traded_value(&exchange, "agentsmith"));
    assert_eq!(balance, 5_000_000 - 90_000 - 106_000 + 84_000);

    broker.close().unwrap();
    assert_eq!(exchange.listener_count(), 0);
}

#[test]
fn test_concurrent_clients_and_price_feed() {
    let exchange = Arc::new(SimulatedExchange::with_quotes(&TICKERS));
    let clients = ["client001", "client002", "client003", "client004"];
    let accounts = funded_accounts(&clients);
    let broker = Arc::new(
        Broker::new(
            "busy-desk",
            exchange.clone(),
            accounts.clone(),
            QueueStrategy::thread().unwrap(),
        )
        .unwrap(),
    );
    exchange.open();

    let mut handles = Vec::new();
    for (n, client) in clients.iter().enumerate() {
        let broker = Arc::clone(&broker);
        let client = client.to_string();
        handles.push(thread::spawn(move || {
            for (ticker, price) in TICKERS {
                let offset = 10 * (n as u64 + 1);
                broker
                    .place_order(Order::stop_buy(&client, ticker, 1, price + offset).unwrap())
                    .unwrap();
                broker
                    .place_order(Order::stop_sell(&client, ticker, 1, price - offset).unwrap())
                    .unwrap();
            }
        }));
    }
    let feed_exchange = exchange.clone();
    let feed = thread::spawn(move || {
        for (ticker, price) in TICKERS {
            feed_exchange.set_price(ticker, price + 25);
            feed_exchange.set_price(ticker, price - 25);
            feed_exchange.set_price(ticker, price);
        }
    });
    for handle in handles {
        handle.join().unwrap();
    }
    feed.join().unwrap();

    // Sweep every ticker through both trigger ranges once all orders exist
    for (ticker, price) in TICKERS {
        exchange.set_price(ticker, price + 100);
        exchange.set_price(ticker, price - 100);
    }
    broker.wait_for_dispatch().unwrap();

    let trades = exchange.executed_trades();
    assert_eq!(trades.len(), clients.len() * TICKERS.len() * 2);
    let unique: std::collections::HashSet<OrderId> =
        trades.iter().map(|trade| trade.order_id).collect();
    assert_eq!(unique.len(), trades.len());
    for client in clients {
        let account = accounts.get_account(client).unwrap();
        assert_eq!(account.balance(), 5_000_000 + traded_value(&exchange, client));
    }
    for symbol in broker.symbols() {
        assert_eq!(broker.order_manager(&symbol).unwrap().pending_count(), 0);
    }

    broker.close().unwrap();
}

#[test]
fn test_unknown_symbol_over_public_api() {
    let exchange = Arc::new(SimulatedExchange::with_quotes(&TICKERS));
    let broker = Broker::new(
        "strict-desk",
        exchange,
        funded_accounts(&["agentsmith"]),
        QueueStrategy::default(),
    )
    .unwrap();

    let order = Order::stop_sell("agentsmith", "ZZZZ", 1, 100).unwrap();
    assert!(matches!(
        broker.place_order(order),
        Err(BrokerError::UnknownSymbol(_))
    ));
    assert!(broker.pending_market_orders().is_empty());
}
