//! Example loading a broker configuration that drains queues on a Tokio
//! runtime.

use broker_rs::prelude::*;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let config = BrokerConfig::from_json_str(r#"{ "name": "async-desk", "dispatch": "tokio" }"#)?;
    info!("Loaded configuration: {:?}", config);

    let exchange = Arc::new(SimulatedExchange::with_quotes(&[("T", 2_500)]));
    let accounts = Arc::new(InMemoryAccountManager::new());
    let broker = {
        // The tokio dispatch mode picks up the runtime of the current context
        let _guard = runtime.enter();
        Broker::from_config(&config, exchange.clone(), accounts)?
    };
    broker.create_account("trinity01", "rabbit", 500_000)?;

    for limit in [2_450, 2_400, 2_350] {
        broker.place_order(Order::stop_sell("trinity01", "T", 10, limit)?)?;
    }
    exchange.open();
    exchange.set_price("T", 2_380);
    broker.wait_for_dispatch()?;

    for trade in exchange.executed_trades() {
        info!("Trade {}: {} {} @ {}", trade.order_id, trade.side, trade.ticker, trade.price);
    }
    info!(
        "Balance: {}",
        broker.get_account("trinity01", "rabbit")?.balance()
    );

    broker.close()?;
    Ok(())
}
