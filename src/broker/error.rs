//! Broker error types

use crate::account::AccountError;
use crate::exchange::ExchangeError;

/// Errors that can occur within the broker and its dispatch queues
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// The broker was used before it was ready or after it was closed,
    /// or a required collaborator is missing
    #[error("broker not configured: {0}")]
    Configuration(String),

    /// A stop order referenced a ticker that has no order manager
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The order is malformed or was routed to the wrong entry point
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Login validation failed for the given account
    #[error("invalid credentials for account {0}")]
    InvalidCredentials(String),

    /// Error reported by the account manager
    #[error("account error: {0}")]
    Account(#[from] AccountError),

    /// Error reported by the stock exchange
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// A trade executed at the exchange but could not be reflected in the account
    #[error("settlement failed for account {account_id}: {message}")]
    Settlement {
        /// Account the trade belongs to
        account_id: String,
        /// Underlying failure
        message: String,
    },

    /// A dispatch consumer rejected an order
    #[error("order consumer failed: {0}")]
    ConsumerFailure(String),

    /// Work was submitted to a dispatcher that has been shut down
    #[error("dispatcher has been shut down")]
    DispatcherStopped,

    /// The broker configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BrokerError {
    #[cold]
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BrokerError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        BrokerError::Config(err.to_string())
    }
}
