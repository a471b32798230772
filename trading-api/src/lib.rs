//! # Trading API
//!
//! Shared vocabulary of the paper-trading simulator.
//!
//! ## Modules
//! - `model`: Accounts, positions, quotes and leaderboard types with stable serialization.
//! - `traits`: Store and provider capabilities the services are built against.
//! - `error`: Typed failures returned across crate boundaries.

pub mod error;
pub mod model;
pub mod traits;

pub use error::{MarketDataError, ProviderError, StoreError, TradeError};
pub use model::account::{Account, NewAccount, Profile};
pub use model::ids::AccountId;
pub use model::leaderboard::{LeaderboardEntry, LeaderboardPage};
pub use model::position::Position;
pub use model::quote::{ProviderQuote, Quote, QuoteRecord, QuoteView};
pub use traits::history::HistoryLog;
pub use traits::ledger::{Ledger, LedgerSession, LockedAccount};
pub use traits::quote_cache::{QuoteCache, QuoteSubscription};
pub use traits::quote_provider::QuoteProvider;
pub use traits::ranking::RankedSet;

pub mod prelude {
    pub use crate::model::ids::AccountId;
    pub use crate::model::quote::Quote;
    pub use crate::traits::{
        history::HistoryLog, ledger::Ledger, quote_cache::QuoteCache,
        quote_provider::QuoteProvider, ranking::RankedSet,
    };
    pub use rust_decimal::Decimal;
}
