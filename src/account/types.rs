//! Account contract consumed by the broker.

use crate::broker::order::Order;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Minimum length of an account name
pub const MIN_ACCOUNT_NAME_LEN: usize = 8;

/// Minimum opening balance, in cents
pub const MIN_ACCOUNT_BALANCE: i64 = 100_000;

/// Errors reported by an account manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AccountError {
    /// No account exists with the given name
    #[error("account not found: {0}")]
    NotFound(String),

    /// An account with the given name already exists
    #[error("account already exists: {0}")]
    AlreadyExists(String),

    /// The account name is too short
    #[error("account name {name:?} must be at least {min} characters")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Minimum accepted length
        min: usize,
    },

    /// The opening balance is below the minimum
    #[error("opening balance {balance} is below the minimum of {min}")]
    InsufficientBalance {
        /// The rejected balance
        balance: i64,
        /// Minimum accepted balance
        min: i64,
    },

    /// The account could not be stored
    #[error("unable to persist account {name}: {message}")]
    Persistence {
        /// Account that failed to persist
        name: String,
        /// Underlying failure
        message: String,
    },

    /// The account manager has been closed
    #[error("account manager is closed")]
    Closed,
}

/// A brokerage account. Balances are signed cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    name: String,
    credential: Vec<u8>,
    balance: i64,
}

impl Account {
    /// Create an account, validating name length and opening balance
    pub fn new(name: &str, credential: &[u8], balance: i64) -> Result<Self, AccountError> {
        if name.chars().count() < MIN_ACCOUNT_NAME_LEN {
            return Err(AccountError::InvalidName {
                name: name.to_string(),
                min: MIN_ACCOUNT_NAME_LEN,
            });
        }
        if balance < MIN_ACCOUNT_BALANCE {
            return Err(AccountError::InsufficientBalance {
                balance,
                min: MIN_ACCOUNT_BALANCE,
            });
        }
        Ok(Self {
            name: name.to_string(),
            credential: credential.to_vec(),
            balance,
        })
    }

    /// Account name, also the account id carried by orders
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current balance in cents
    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Whether `credential` matches the stored one
    #[must_use]
    pub fn matches_credential(&self, credential: &[u8]) -> bool {
        self.credential == credential
    }

    /// Apply an executed order to the balance, returning the new balance.
    ///
    /// Persisting the change is the caller's responsibility.
    pub fn reflect_order(&mut self, order: &Order, execution_price: u64) -> i64 {
        let value = order.value_of_order(execution_price);
        self.balance = self.balance.saturating_add(value);
        trace!(account = %self.name, order_id = %order.id(), value, balance = self.balance, "order reflected");
        self.balance
    }
}

/// Account storage used by the broker
pub trait AccountManager: Send + Sync {
    /// Create and store a new account
    fn create_account(
        &self,
        name: &str,
        password: &str,
        balance: i64,
    ) -> Result<Account, AccountError>;

    /// Look up an account by name
    fn get_account(&self, name: &str) -> Result<Account, AccountError>;

    /// Remove an account
    fn delete_account(&self, name: &str) -> Result<(), AccountError>;

    /// Check a name/password pair
    fn validate_login(&self, name: &str, password: &str) -> Result<bool, AccountError>;

    /// Store the current state of an account
    fn persist(&self, account: &Account) -> Result<(), AccountError>;

    /// Release the underlying storage
    fn close(&self) -> Result<(), AccountError>;
}
