//! Durable ledger of account balances and positions.
//!
//! Mutations go through a [`LedgerSession`], an explicit transaction object with
//! row-level locks. The session API encodes the lock order: a position row can
//! only be locked by presenting the [`LockedAccount`] of its owner, so every
//! caller takes the account row first.

use crate::error::StoreError;
use crate::model::account::{Account, NewAccount};
use crate::model::ids::AccountId;
use crate::model::position::Position;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Proof that the account row is locked by the current session.
///
/// Only store engines construct this, from inside `lock_account`.
#[derive(Debug, Clone)]
pub struct LockedAccount {
    account: Account,
}

impl LockedAccount {
    /// For store engines: wraps the row they just locked.
    pub fn new(account: Account) -> Self {
        Self { account }
    }

    pub fn id(&self) -> AccountId {
        self.account.id()
    }

    /// Account row as read when the lock was taken.
    pub fn account(&self) -> &Account {
        &self.account
    }
}

/// A transaction on the ledger.
///
/// Writes are invisible to other readers until `commit` succeeds. Dropping a
/// session without committing rolls it back and releases its locks.
#[async_trait]
pub trait LedgerSession: Send {
    /// Locks the account row until the session ends.
    async fn lock_account(&mut self, id: AccountId) -> Result<LockedAccount, StoreError>;

    /// Locks the `(account, symbol)` position row, creating the lock when the
    /// row does not exist yet. Returns the current row, if any.
    async fn lock_position(
        &mut self,
        account: &LockedAccount,
        symbol: &str,
    ) -> Result<Option<Position>, StoreError>;

    async fn set_balance(
        &mut self,
        account: &LockedAccount,
        balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Inserts or replaces a locked position row.
    async fn save_position(
        &mut self,
        account: &LockedAccount,
        position: &Position,
    ) -> Result<(), StoreError>;

    async fn delete_position(
        &mut self,
        account: &LockedAccount,
        symbol: &str,
    ) -> Result<(), StoreError>;

    /// Applies every staged write atomically, or none of them.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards staged writes and releases locks.
    async fn rollback(self: Box<Self>);
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError>;

    /// Registers an account. Usernames are unique.
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError>;

    /// Removes an account and its positions. Returns `false` if it did not exist.
    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Committed state of one account.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Committed state of every account, ordered by id.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Committed positions of one account, ordered by symbol.
    async fn positions(&self, id: AccountId) -> Result<Vec<Position>, StoreError>;
}
