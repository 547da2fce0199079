/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Broker orchestration.
//!
//! The [`Broker`] owns one market order queue, gated by the exchange's open
//! flag, and one [`OrderManager`] per listed ticker. Stop orders dispatched by
//! a manager are converted into market orders and forwarded to the market
//! queue; market orders dispatched by the market queue are executed at the
//! exchange and settled into the owning account.

use crate::account::{Account, AccountManager};
use crate::broker::config::BrokerConfig;
use crate::broker::error::BrokerError;
use crate::broker::manager::OrderManager;
use crate::broker::order::Order;
use crate::broker::queue::{OrderConsumer, OrderQueue, lock};
use crate::broker::strategy::QueueStrategy;
use crate::exchange::{ExchangeEvent, ExchangeListener, StockExchange, StockQuote};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a [`Broker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerState {
    /// Order managers are still being created
    Unconfigured,
    /// Accepting orders and exchange events
    Ready,
    /// Terminal; every operation is rejected
    Closed,
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerState::Unconfigured => write!(f, "unconfigured"),
            BrokerState::Ready => write!(f, "ready"),
            BrokerState::Closed => write!(f, "closed"),
        }
    }
}

/// State reachable from the exchange listener
struct BrokerCore {
    name: String,
    state: AtomicCell<BrokerState>,
    exchange: Arc<dyn StockExchange>,
    accounts: Arc<dyn AccountManager>,
    market_orders: Arc<dyn OrderQueue<bool, Order>>,
    managers: DashMap<String, Arc<OrderManager>>,
}

impl BrokerCore {
    fn ensure_ready(&self) -> Result<(), BrokerError> {
        match self.state.load() {
            BrokerState::Ready => Ok(()),
            state => Err(BrokerError::Configuration(format!(
                "broker {} is {state}",
                self.name
            ))),
        }
    }

    fn on_event(&self, event: &ExchangeEvent) -> Result<(), BrokerError> {
        match event {
            ExchangeEvent::Opened => self.set_market_open(true),
            ExchangeEvent::Closed => self.set_market_open(false),
            ExchangeEvent::PriceChanged { ticker, price } => self.price_changed(ticker, *price),
        }
    }

    fn set_market_open(&self, open: bool) -> Result<(), BrokerError> {
        self.ensure_ready()?;
        info!(broker = %self.name, open, "market state changed");
        self.market_orders.set_threshold(open);
        Ok(())
    }

    fn price_changed(&self, ticker: &str, price: u64) -> Result<(), BrokerError> {
        self.ensure_ready()?;
        // Cloned out so no map shard is locked while queues drain
        let manager = self.managers.get(ticker).map(|entry| Arc::clone(entry.value()));
        match manager {
            Some(manager) => manager.adjust_price(price),
            None => trace!(broker = %self.name, ticker, price, "price change for untracked ticker"),
        }
        Ok(())
    }
}

/// Execute a dispatched market order and settle it.
///
/// An exchange failure aborts the drain. A settlement failure is logged and
/// swallowed: the trade has already happened at the exchange.
fn execute_order(
    exchange: &dyn StockExchange,
    accounts: &dyn AccountManager,
    order: Order,
) -> Result<(), BrokerError> {
    let price = exchange.execute_trade(&order)?;
    debug!(order_id = %order.id(), ticker = %order.ticker(), price, "order executed");

    if let Err(e) = settle(accounts, &order, price) {
        let failure = BrokerError::Settlement {
            account_id: order.account_id().to_string(),
            message: e.to_string(),
        };
        error!(order_id = %order.id(), price, error = %failure, "trade executed but not settled");
    }
    Ok(())
}

fn settle(accounts: &dyn AccountManager, order: &Order, price: u64) -> Result<i64, BrokerError> {
    let mut account = accounts.get_account(order.account_id())?;
    let balance = account.reflect_order(order, price);
    accounts.persist(&account)?;
    trace!(account = %account.name(), balance, "account settled");
    Ok(balance)
}

/// Routes orders to dispatch queues and reacts to exchange events.
///
/// # Example
///
/// ```
/// use broker_rs::prelude::*;
/// use std::sync::Arc;
///
/// let exchange = Arc::new(SimulatedExchange::with_quotes(&[("F", 1_000)]));
/// let accounts = Arc::new(InMemoryAccountManager::new());
/// let broker = Broker::new("demo", exchange.clone(), accounts.clone(), QueueStrategy::Inline)?;
///
/// broker.create_account("neotheone", "redpill", 500_000)?;
/// broker.place_order(Order::stop_buy("neotheone", "F", 10, 1_100)?)?;
///
/// exchange.open();
/// exchange.set_price("F", 1_100);
/// assert_eq!(broker.get_account("neotheone", "redpill")?.balance(), 489_000);
/// # Ok::<(), BrokerError>(())
/// ```
pub struct Broker {
    core: Arc<BrokerCore>,
    strategy: QueueStrategy,
    listener: Mutex<Option<ExchangeListener>>,
}

impl Broker {
    /// Create a broker and an order manager for every ticker the exchange
    /// quotes. Tickers without a quote are skipped.
    ///
    /// # Errors
    ///
    /// `Configuration` when `name` is blank.
    pub fn new(
        name: &str,
        exchange: Arc<dyn StockExchange>,
        accounts: Arc<dyn AccountManager>,
        strategy: QueueStrategy,
    ) -> Result<Self, BrokerError> {
        if name.trim().is_empty() {
            return Err(BrokerError::Configuration(
                "broker name must not be blank".to_string(),
            ));
        }
        let market_orders = strategy.create_queue::<bool, Order>(
            &format!("{name} market"),
            exchange.is_open(),
            Arc::new(|open: &bool, _order: &Order| *open),
            Arc::new(Order::natural_order),
        );
        let consumer_exchange = Arc::clone(&exchange);
        let consumer_accounts = Arc::clone(&accounts);
        market_orders.set_consumer(Arc::new(move |order: Order| {
            execute_order(consumer_exchange.as_ref(), consumer_accounts.as_ref(), order)
        }));

        let core = Arc::new(BrokerCore {
            name: name.to_string(),
            state: AtomicCell::new(BrokerState::Unconfigured),
            exchange,
            accounts,
            market_orders,
            managers: DashMap::new(),
        });

        let forward: OrderConsumer<Order> = {
            let market_orders = Arc::clone(&core.market_orders);
            Arc::new(move |order: Order| {
                trace!(order_id = %order.id(), ticker = %order.ticker(), "stop order triggered");
                market_orders.enqueue(order.to_market());
                Ok(())
            })
        };

        for ticker in core.exchange.tickers() {
            let Some(quote) = core.exchange.quote(&ticker) else {
                warn!(broker = %name, ticker = %ticker, "no quote available, ticker skipped");
                continue;
            };
            let manager = OrderManager::with_strategy(&ticker, quote.price, &strategy);
            manager.set_buy_order_processor(Arc::clone(&forward));
            manager.set_sell_order_processor(Arc::clone(&forward));
            core.managers.insert(ticker, Arc::new(manager));
        }
        core.state.store(BrokerState::Ready);

        let listener = Self::listen(Arc::downgrade(&core));
        core.exchange.add_listener(Arc::clone(&listener));
        // An open or close published before registration would be missed
        core.market_orders.set_threshold(core.exchange.is_open());

        info!(
            broker = %name,
            symbols = core.managers.len(),
            worker = strategy.is_worker_backed(),
            "broker ready"
        );
        Ok(Self {
            core,
            strategy,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Create a broker as described by `config`
    ///
    /// # Errors
    ///
    /// `Configuration` when the dispatch mode cannot be set up.
    pub fn from_config(
        config: &BrokerConfig,
        exchange: Arc<dyn StockExchange>,
        accounts: Arc<dyn AccountManager>,
    ) -> Result<Self, BrokerError> {
        let strategy = config.strategy()?;
        Self::new(&config.name, exchange, accounts, strategy)
    }

    fn listen(core: Weak<BrokerCore>) -> ExchangeListener {
        Arc::new(move |event: &ExchangeEvent| {
            let Some(core) = core.upgrade() else {
                return;
            };
            if let Err(e) = core.on_event(event) {
                debug!(broker = %core.name, ?event, error = %e, "exchange event ignored");
            }
        })
    }

    /// Name of the broker
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> BrokerState {
        self.core.state.load()
    }

    /// Tracked tickers, sorted. Empty once closed.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .core
            .managers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Whether stop orders on `ticker` are accepted
    pub fn has_symbol(&self, ticker: &str) -> bool {
        self.core.managers.contains_key(ticker)
    }

    /// The order manager of `ticker`
    pub fn order_manager(&self, ticker: &str) -> Option<Arc<OrderManager>> {
        self.core
            .managers
            .get(ticker)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Market orders waiting for the exchange to open
    pub fn pending_market_orders(&self) -> Vec<Order> {
        self.core.market_orders.pending()
    }

    /// Route an order by kind.
    ///
    /// # Errors
    ///
    /// See [`place_market_order`](Broker::place_market_order) and
    /// [`place_stop_order`](Broker::place_stop_order).
    pub fn place_order(&self, order: Order) -> Result<(), BrokerError> {
        if order.is_stop() {
            self.place_stop_order(order)
        } else {
            self.place_market_order(order)
        }
    }

    /// Queue a market order. It executes as soon as the exchange is open.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, `InvalidOrder` for a stop order.
    pub fn place_market_order(&self, order: Order) -> Result<(), BrokerError> {
        self.core.ensure_ready()?;
        if order.is_stop() {
            return Err(BrokerError::InvalidOrder(format!(
                "order {} is a stop order",
                order.id()
            )));
        }
        trace!(broker = %self.core.name, order_id = %order.id(), "placing market order");
        self.core.market_orders.enqueue(order);
        Ok(())
    }

    /// Hand a stop order to the manager of its ticker.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, `UnknownSymbol` for an untracked ticker,
    /// `InvalidOrder` for a market order. A rejected order is not retained.
    pub fn place_stop_order(&self, order: Order) -> Result<(), BrokerError> {
        self.core.ensure_ready()?;
        let manager = self
            .order_manager(order.ticker())
            .ok_or_else(|| BrokerError::UnknownSymbol(order.ticker().to_string()))?;
        manager.queue_order(order)
    }

    /// Current quote of `ticker` at the exchange
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready.
    pub fn request_quote(&self, ticker: &str) -> Result<Option<StockQuote>, BrokerError> {
        self.core.ensure_ready()?;
        Ok(self.core.exchange.quote(ticker))
    }

    /// Open a new account
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, `Account` when the manager rejects it.
    pub fn create_account(
        &self,
        name: &str,
        password: &str,
        balance: i64,
    ) -> Result<Account, BrokerError> {
        self.core.ensure_ready()?;
        Ok(self.core.accounts.create_account(name, password, balance)?)
    }

    /// Fetch an account after validating its credentials
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, `InvalidCredentials` on a password
    /// mismatch, `Account` when the account cannot be read.
    pub fn get_account(&self, name: &str, password: &str) -> Result<Account, BrokerError> {
        self.core.ensure_ready()?;
        if !self.core.accounts.validate_login(name, password)? {
            warn!(broker = %self.core.name, account = %name, "login rejected");
            return Err(BrokerError::InvalidCredentials(name.to_string()));
        }
        Ok(self.core.accounts.get_account(name)?)
    }

    /// Remove an account
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, `Account` when the manager fails.
    pub fn delete_account(&self, name: &str) -> Result<(), BrokerError> {
        self.core.ensure_ready()?;
        Ok(self.core.accounts.delete_account(name)?)
    }

    /// Handle [`ExchangeEvent::Opened`]: release queued market orders.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready.
    pub fn exchange_opened(&self) -> Result<(), BrokerError> {
        self.core.set_market_open(true)
    }

    /// Handle [`ExchangeEvent::Closed`]: hold market orders from now on.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready.
    pub fn exchange_closed(&self) -> Result<(), BrokerError> {
        self.core.set_market_open(false)
    }

    /// Handle [`ExchangeEvent::PriceChanged`]. Untracked tickers are ignored.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready.
    pub fn price_changed(&self, ticker: &str, price: u64) -> Result<(), BrokerError> {
        self.core.price_changed(ticker, price)
    }

    /// Block until every scheduled drain has run. Returns immediately for
    /// inline queues.
    ///
    /// # Errors
    ///
    /// `Configuration` unless ready, or when called on a current-thread
    /// Tokio runtime that also hosts the dispatcher.
    pub fn wait_for_dispatch(&self) -> Result<(), BrokerError> {
        self.core.ensure_ready()?;
        self.strategy.wait_idle()
    }

    /// Shut the broker down.
    ///
    /// Unregisters from the exchange, closes the account manager, drops
    /// every order manager and stops the shared dispatcher. Orders still
    /// queued are discarded.
    ///
    /// # Errors
    ///
    /// `Configuration` if already closed, `Account` if the account manager
    /// fails to close. The broker is closed in both cases.
    pub fn close(&self) -> Result<(), BrokerError> {
        if self
            .core
            .state
            .compare_exchange(BrokerState::Ready, BrokerState::Closed)
            .is_err()
        {
            return Err(BrokerError::Configuration(format!(
                "broker {} is already closed",
                self.core.name
            )));
        }

        if let Some(listener) = lock(&self.listener).take() {
            self.core.exchange.remove_listener(&listener);
        }
        let accounts = self.core.accounts.close();
        let discarded: usize = self
            .core
            .managers
            .iter()
            .map(|entry| entry.value().pending_count())
            .sum::<usize>()
            + self.core.market_orders.len();
        self.core.managers.clear();
        self.strategy.shutdown();
        info!(broker = %self.core.name, discarded, "broker closed");

        accounts.map_err(|e| {
            error!(broker = %self.core.name, error = %e, "account manager failed to close");
            BrokerError::from(e)
        })
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        // Nothing to do after close; it already unregistered
        if let Some(listener) = lock(&self.listener).take() {
            self.core.exchange.remove_listener(&listener);
            debug!(broker = %self.core.name, "dropped without close, listener removed");
        }
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("name", &self.core.name)
            .field("state", &self.state())
            .field("symbols", &self.core.managers.len())
            .field("market_orders", &self.core.market_orders.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}
