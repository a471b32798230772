use thiserror::Error;
use trading::{AccountId, StoreError};

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("net worth of account {0} is out of range")]
    Overflow(AccountId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
