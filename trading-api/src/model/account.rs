//! Account model.
//!
//! An account is a cash balance plus the display profile shown on the leaderboard.
//! Holdings live in separate [`Position`](super::position::Position) rows.

use super::ids::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Public display attributes of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl Profile {
    pub fn new(
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// Registration request handed to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    profile: Profile,
    initial_balance: Decimal,
}

impl NewAccount {
    pub fn new(profile: Profile, initial_balance: Decimal) -> Self {
        Self {
            profile,
            initial_balance,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }
}

/// A user's cash balance and identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    #[serde(flatten)]
    profile: Profile,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, profile: Profile, balance: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            balance,
            created_at,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns a copy of this account carrying `balance`.
    pub fn with_balance(&self, balance: Decimal) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }
}
