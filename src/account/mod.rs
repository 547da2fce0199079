//! Account collaborator: the contract the broker settles trades through and
//! an in-memory implementation.

pub mod memory;
pub mod types;

pub use memory::InMemoryAccountManager;
pub use types::{Account, AccountError, AccountManager, MIN_ACCOUNT_BALANCE, MIN_ACCOUNT_NAME_LEN};
