//! Relational-style ledger with pessimistic row locks.
//!
//! Every account is a row guarded by its own async lock; each `(account, symbol)`
//! position row has another. Sessions stage writes privately and publish them on
//! commit, so readers only ever see committed state and never wait on a lock.

use super::poisoned;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use trading::{
    Account, AccountId, Ledger, LedgerSession, LockedAccount, NewAccount, Position, StoreError,
};

struct AccountRow {
    lock: Arc<RowLock<()>>,
    deleted: AtomicBool,
    account: RwLock<Account>,
    positions: RwLock<BTreeMap<String, Position>>,
    position_locks: Mutex<HashMap<String, Arc<RowLock<()>>>>,
}

impl AccountRow {
    fn new(account: Account) -> Self {
        Self {
            lock: Arc::new(RowLock::new(())),
            deleted: AtomicBool::new(false),
            account: RwLock::new(account),
            positions: RwLock::new(BTreeMap::new()),
            position_locks: Mutex::new(HashMap::new()),
        }
    }

    fn position_lock(&self, symbol: &str) -> Result<Arc<RowLock<()>>, StoreError> {
        let mut locks = self.position_locks.lock().map_err(poisoned)?;
        Ok(locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone())
    }
}

#[derive(Default)]
struct Faults {
    failing_commits: AtomicUsize,
    failing_position_reads: Mutex<Vec<AccountId>>,
}

struct LedgerInner {
    rows: RwLock<BTreeMap<AccountId, Arc<AccountRow>>>,
    next_id: AtomicI64,
    faults: Faults,
}

impl LedgerInner {
    fn row(&self, id: AccountId) -> Result<Option<Arc<AccountRow>>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }
}

/// In-process ledger. Cheap to clone; clones share the same rows.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                rows: RwLock::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                faults: Faults::default(),
            }),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryLedger {
    /// Makes the next `count` commits fail with `StoreError::Unavailable`.
    pub fn fail_next_commits(&self, count: usize) {
        self.inner
            .faults
            .failing_commits
            .store(count, Ordering::SeqCst);
    }

    /// Makes every `positions` read of `id` fail.
    pub fn fail_position_reads(&self, id: AccountId) {
        if let Ok(mut ids) = self.inner.faults.failing_position_reads.lock() {
            ids.push(id);
        }
    }

    /// Writes a position row directly, bypassing sessions.
    pub fn seed_position(&self, position: Position) -> Result<(), StoreError> {
        let row = self
            .inner
            .row(position.account_id())?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", position.account_id())))?;
        let mut positions = row.positions.write().map_err(poisoned)?;
        positions.insert(position.symbol().to_string(), position);
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, StoreError> {
        Ok(Box::new(MemorySession::new(self.inner.clone())))
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        if new_account.initial_balance() < Decimal::ZERO {
            return Err(StoreError::Constraint("initial balance is negative".into()));
        }

        let mut rows = self.inner.rows.write().map_err(poisoned)?;
        for row in rows.values() {
            let existing = row.account.read().map_err(poisoned)?;
            if existing.profile().username == new_account.profile().username {
                return Err(StoreError::Constraint(format!(
                    "username {} already exists",
                    new_account.profile().username
                )));
            }
        }

        let id = AccountId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let account = Account::new(
            id,
            new_account.profile().clone(),
            new_account.initial_balance(),
            Utc::now(),
        );
        rows.insert(id, Arc::new(AccountRow::new(account.clone())));
        debug!("Created account {} ({})", id, account.profile().username);
        Ok(account)
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        let Some(row) = self.inner.row(id)? else {
            return Ok(false);
        };
        // Wait for in-flight trades on the row to finish.
        let _guard = row.lock.clone().lock_owned().await;
        row.deleted.store(true, Ordering::SeqCst);
        let mut rows = self.inner.rows.write().map_err(poisoned)?;
        Ok(rows.remove(&id).is_some())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match self.inner.row(id)? {
            Some(row) => Ok(Some(row.account.read().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = self.inner.rows.read().map_err(poisoned)?;
        rows.values()
            .map(|row| row.account.read().map(|a| a.clone()).map_err(poisoned))
            .collect()
    }

    async fn positions(&self, id: AccountId) -> Result<Vec<Position>, StoreError> {
        {
            let failing = self
                .inner
                .faults
                .failing_position_reads
                .lock()
                .map_err(poisoned)?;
            if failing.contains(&id) {
                return Err(StoreError::Unavailable(format!(
                    "positions of account {id} unreadable"
                )));
            }
        }
        let row = self
            .inner
            .row(id)?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        let positions = row.positions.read().map_err(poisoned)?;
        Ok(positions.values().cloned().collect())
    }
}

type PositionKey = (AccountId, String);

struct HeldAccount {
    row: Arc<AccountRow>,
    _guard: OwnedMutexGuard<()>,
}

/// A transaction against [`MemoryLedger`].
pub struct MemorySession {
    inner: Arc<LedgerInner>,
    accounts: HashMap<AccountId, HeldAccount>,
    positions: HashMap<PositionKey, OwnedMutexGuard<()>>,
    balances: HashMap<AccountId, Decimal>,
    writes: BTreeMap<PositionKey, Option<Position>>,
}

impl MemorySession {
    fn new(inner: Arc<LedgerInner>) -> Self {
        Self {
            inner,
            accounts: HashMap::new(),
            positions: HashMap::new(),
            balances: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    fn held(&self, account: &LockedAccount) -> Result<&HeldAccount, StoreError> {
        self.accounts.get(&account.id()).ok_or_else(|| {
            StoreError::LockOrder(format!("account {} is not locked by this session", account.id()))
        })
    }

    fn ensure_position_locked(&self, key: &PositionKey) -> Result<(), StoreError> {
        if self.positions.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::LockOrder(format!(
                "position {} of account {} is not locked by this session",
                key.1, key.0
            )))
        }
    }

    fn staged_account(&self, held: &HeldAccount) -> Result<Account, StoreError> {
        let account = held.row.account.read().map_err(poisoned)?.clone();
        Ok(match self.balances.get(&account.id()) {
            Some(balance) => account.with_balance(*balance),
            None => account,
        })
    }

    fn validate(&self) -> Result<(), StoreError> {
        for (id, balance) in &self.balances {
            if *balance < Decimal::ZERO {
                return Err(StoreError::Constraint(format!(
                    "balance of account {id} would be {balance}"
                )));
            }
        }
        for ((id, symbol), write) in &self.writes {
            if let Some(position) = write {
                if position.quantity() <= Decimal::ZERO {
                    return Err(StoreError::Constraint(format!(
                        "position {symbol} of account {id} would hold {}",
                        position.quantity()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerSession for MemorySession {
    async fn lock_account(&mut self, id: AccountId) -> Result<LockedAccount, StoreError> {
        if let Some(held) = self.accounts.get(&id) {
            return Ok(LockedAccount::new(self.staged_account(held)?));
        }

        let row = self
            .inner
            .row(id)?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        let guard = row.lock.clone().lock_owned().await;
        if row.deleted.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound(format!("account {id}")));
        }

        let held = HeldAccount { row, _guard: guard };
        let account = self.staged_account(&held)?;
        self.accounts.insert(id, held);
        Ok(LockedAccount::new(account))
    }

    async fn lock_position(
        &mut self,
        account: &LockedAccount,
        symbol: &str,
    ) -> Result<Option<Position>, StoreError> {
        let row = self.held(account)?.row.clone();
        let key = (account.id(), symbol.to_string());

        if !self.positions.contains_key(&key) {
            let guard = row.position_lock(symbol)?.lock_owned().await;
            self.positions.insert(key.clone(), guard);
        }

        if let Some(staged) = self.writes.get(&key) {
            return Ok(staged.clone());
        }
        let positions = row.positions.read().map_err(poisoned)?;
        Ok(positions.get(symbol).cloned())
    }

    async fn set_balance(
        &mut self,
        account: &LockedAccount,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        self.held(account)?;
        self.balances.insert(account.id(), balance);
        Ok(())
    }

    async fn save_position(
        &mut self,
        account: &LockedAccount,
        position: &Position,
    ) -> Result<(), StoreError> {
        self.held(account)?;
        if position.account_id() != account.id() {
            return Err(StoreError::Constraint(format!(
                "position belongs to account {}, not {}",
                position.account_id(),
                account.id()
            )));
        }
        let key = (account.id(), position.symbol().to_string());
        self.ensure_position_locked(&key)?;
        self.writes.insert(key, Some(position.clone()));
        Ok(())
    }

    async fn delete_position(
        &mut self,
        account: &LockedAccount,
        symbol: &str,
    ) -> Result<(), StoreError> {
        self.held(account)?;
        let key = (account.id(), symbol.to_string());
        self.ensure_position_locked(&key)?;
        self.writes.insert(key, None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let failing = &self.inner.faults.failing_commits;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            warn!("Injected commit failure");
            return Err(StoreError::Unavailable("commit failed".into()));
        }

        self.validate()?;

        // Every touched row is locked by this session, so no other writer can
        // interleave between the updates below.
        for (id, balance) in &self.balances {
            let held = &self.accounts[id];
            let mut account = held.row.account.write().map_err(poisoned)?;
            *account = account.with_balance(*balance);
        }
        for ((id, symbol), write) in &self.writes {
            let held = &self.accounts[id];
            let mut positions = held.row.positions.write().map_err(poisoned)?;
            match write {
                Some(position) => {
                    positions.insert(symbol.clone(), position.clone());
                }
                None => {
                    positions.remove(symbol);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        debug!(
            "Rolled back session holding {} account locks",
            self.accounts.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use trading::Profile;

    async fn ledger_with_account(balance: Decimal) -> (MemoryLedger, AccountId) {
        let ledger = MemoryLedger::new();
        let account = ledger
            .create_account(NewAccount::new(Profile::new("ada", "Ada", "L"), balance))
            .await
            .unwrap();
        (ledger, account.id())
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let (ledger, _) = ledger_with_account(dec!(100)).await;
        let err = ledger
            .create_account(NewAccount::new(Profile::new("ada", "A", "B"), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_writes() {
        let (ledger, id) = ledger_with_account(dec!(1000)).await;
        let mut session = ledger.begin().await.unwrap();
        let account = session.lock_account(id).await.unwrap();
        assert!(session.lock_position(&account, "AAPL").await.unwrap().is_none());

        session.set_balance(&account, dec!(700)).await.unwrap();
        session
            .save_position(&account, &Position::new(id, "AAPL", dec!(2), dec!(150)))
            .await
            .unwrap();

        // Not visible before commit.
        assert_eq!(ledger.get_account(id).await.unwrap().unwrap().balance(), dec!(1000));
        session.commit().await.unwrap();

        assert_eq!(ledger.get_account(id).await.unwrap().unwrap().balance(), dec!(700));
        assert_eq!(ledger.positions(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let (ledger, id) = ledger_with_account(dec!(1000)).await;
        {
            let mut session = ledger.begin().await.unwrap();
            let account = session.lock_account(id).await.unwrap();
            session.set_balance(&account, dec!(1)).await.unwrap();
        }
        assert_eq!(ledger.get_account(id).await.unwrap().unwrap().balance(), dec!(1000));

        // Lock was released by the drop.
        let mut session = ledger.begin().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), session.lock_account(id))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_position_write_requires_position_lock() {
        let (ledger, id) = ledger_with_account(dec!(1000)).await;
        let mut session = ledger.begin().await.unwrap();
        let account = session.lock_account(id).await.unwrap();
        let err = session
            .save_position(&account, &Position::new(id, "AAPL", dec!(1), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LockOrder(_)));
    }

    #[tokio::test]
    async fn test_foreign_locked_account_is_rejected() {
        let (ledger, id) = ledger_with_account(dec!(1000)).await;
        let mut first = ledger.begin().await.unwrap();
        let locked = first.lock_account(id).await.unwrap();

        let mut second = ledger.begin().await.unwrap();
        let err = second.lock_position(&locked, "AAPL").await.unwrap_err();
        assert!(matches!(err, StoreError::LockOrder(_)));
    }

    #[tokio::test]
    async fn test_account_lock_serializes_sessions() {
        let (ledger, id) = ledger_with_account(dec!(1000)).await;
        let mut first = ledger.begin().await.unwrap();
        first.lock_account(id).await.unwrap();

        let mut second = ledger.begin().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), second.lock_account(id)).await;
        assert!(blocked.is_err());

        first.rollback().await;
        tokio::time::timeout(Duration::from_secs(1), second.lock_account(id))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_invariants_checked_at_commit() {
        let (ledger, id) = ledger_with_account(dec!(10)).await;

        let mut session = ledger.begin().await.unwrap();
        let account = session.lock_account(id).await.unwrap();
        session.set_balance(&account, dec!(-0.01)).await.unwrap();
        assert!(matches!(session.commit().await, Err(StoreError::Constraint(_))));

        let mut session = ledger.begin().await.unwrap();
        let account = session.lock_account(id).await.unwrap();
        session.lock_position(&account, "AAPL").await.unwrap();
        session
            .save_position(&account, &Position::new(id, "AAPL", dec!(0), dec!(1)))
            .await
            .unwrap();
        assert!(matches!(session.commit().await, Err(StoreError::Constraint(_))));

        assert_eq!(ledger.get_account(id).await.unwrap().unwrap().balance(), dec!(10));
        assert!(ledger.positions(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_applies_nothing() {
        let (ledger, id) = ledger_with_account(dec!(10)).await;
        ledger.fail_next_commits(1);

        let mut session = ledger.begin().await.unwrap();
        let account = session.lock_account(id).await.unwrap();
        session.set_balance(&account, dec!(5)).await.unwrap();
        assert!(matches!(session.commit().await, Err(StoreError::Unavailable(_))));
        assert_eq!(ledger.get_account(id).await.unwrap().unwrap().balance(), dec!(10));
    }

    #[tokio::test]
    async fn test_deleted_account_disappears() {
        let (ledger, id) = ledger_with_account(dec!(10)).await;
        assert!(ledger.delete_account(id).await.unwrap());
        assert!(!ledger.delete_account(id).await.unwrap());
        assert!(ledger.get_account(id).await.unwrap().is_none());

        let mut session = ledger.begin().await.unwrap();
        assert!(matches!(
            session.lock_account(id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
