//! In-memory account manager.

use crate::account::types::{Account, AccountError, AccountManager};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// [`AccountManager`] keeping accounts in a concurrent map.
///
/// Credentials are stored as the raw password bytes.
#[derive(Debug, Default)]
pub struct InMemoryAccountManager {
    accounts: DashMap<String, Account>,
    closed: AtomicBool,
    fail_persistence: AtomicBool,
}

impl InMemoryAccountManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `persist` fail, for exercising settlement
    /// failure handling
    pub fn fail_persistence(&self, fail: bool) {
        self.fail_persistence.store(fail, Ordering::SeqCst);
    }

    /// Number of stored accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), AccountError> {
        if self.is_closed() {
            return Err(AccountError::Closed);
        }
        Ok(())
    }
}

impl AccountManager for InMemoryAccountManager {
    fn create_account(
        &self,
        name: &str,
        password: &str,
        balance: i64,
    ) -> Result<Account, AccountError> {
        self.ensure_open()?;
        let account = Account::new(name, password.as_bytes(), balance)?;
        match self.accounts.entry(name.to_string()) {
            Entry::Occupied(_) => Err(AccountError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                info!(account = %name, balance, "account created");
                Ok(account)
            }
        }
    }

    fn get_account(&self, name: &str) -> Result<Account, AccountError> {
        self.ensure_open()?;
        self.accounts
            .get(name)
            .map(|account| account.clone())
            .ok_or_else(|| AccountError::NotFound(name.to_string()))
    }

    fn delete_account(&self, name: &str) -> Result<(), AccountError> {
        self.ensure_open()?;
        match self.accounts.remove(name) {
            Some(_) => {
                info!(account = %name, "account deleted");
                Ok(())
            }
            None => Err(AccountError::NotFound(name.to_string())),
        }
    }

    fn validate_login(&self, name: &str, password: &str) -> Result<bool, AccountError> {
        let account = self.get_account(name)?;
        Ok(account.matches_credential(password.as_bytes()))
    }

    fn persist(&self, account: &Account) -> Result<(), AccountError> {
        self.ensure_open()?;
        if self.fail_persistence.load(Ordering::SeqCst) {
            warn!(account = %account.name(), "persistence failure injected");
            return Err(AccountError::Persistence {
                name: account.name().to_string(),
                message: "storage unavailable".to_string(),
            });
        }
        self.accounts
            .insert(account.name().to_string(), account.clone());
        Ok(())
    }

    fn close(&self) -> Result<(), AccountError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(AccountError::Closed);
        }
        info!("account manager closed");
        Ok(())
    }
}
