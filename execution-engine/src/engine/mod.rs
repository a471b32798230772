//! Trade execution.
//!
//! A trade runs inside one ledger session. The account row is always locked
//! before the position row, by buys and sells alike, so two trades on the same
//! account serialize instead of deadlocking. Any failure after the first lock
//! rolls the session back before the error is returned.

use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use trading::{
    Account, AccountId, Ledger, LedgerSession, LockedAccount, NewAccount, Position, Profile,
    Quote, StoreError, TradeError,
};
use trading_core::clock::now_secs;
use trading_core::MarketData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    market: MarketData,
    ledger: Arc<dyn Ledger>,
    initial_balance: Decimal,
}

impl Engine {
    pub fn new(market: MarketData, ledger: Arc<dyn Ledger>, initial_balance: Decimal) -> Self {
        Self {
            market,
            ledger,
            initial_balance,
        }
    }

    pub fn market(&self) -> &MarketData {
        &self.market
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Registers a new account funded with the configured initial balance.
    pub async fn open_account(&self, profile: Profile) -> Result<Account, StoreError> {
        let account = self
            .ledger
            .create_account(NewAccount::new(profile, self.initial_balance))
            .await?;
        info!(
            "Opened account {} for {} with {}",
            account.id(),
            account.profile().username,
            account.balance()
        );
        Ok(account)
    }

    /// Buys `quantity` of `symbol` at the cached price and returns the updated account.
    pub async fn buy(
        &self,
        account_id: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Account, TradeError> {
        validate_quantity(quantity)?;
        let quote = self.tradable_quote(symbol).await?;

        let mut session = self.begin().await?;
        let outcome = stage_buy(session.as_mut(), account_id, &quote, quantity).await;
        let account = finish(session, outcome).await?;

        info!(
            "{} {} {} @ {} for account {}, balance {}",
            Side::Buy,
            quantity,
            symbol,
            quote.price(),
            account_id,
            account.balance()
        );
        Ok(account)
    }

    /// Sells `quantity` of `symbol` at the cached price and returns the updated account.
    ///
    /// Holdings are checked before the price is read, so selling an unheld symbol
    /// reports `InsufficientQuantity` even while its market is closed.
    pub async fn sell(
        &self,
        account_id: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Account, TradeError> {
        validate_quantity(quantity)?;
        if !self.market.is_tracked(symbol) {
            return Err(TradeError::SymbolNotAllowed(symbol.to_string()));
        }

        let mut session = self.begin().await?;
        let outcome = self
            .stage_sell(session.as_mut(), account_id, symbol, quantity)
            .await;
        let (account, price) = finish(session, outcome).await?;

        info!(
            "{} {} {} @ {} for account {}, balance {}",
            Side::Sell,
            quantity,
            symbol,
            price,
            account_id,
            account.balance()
        );
        Ok(account)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerSession>, TradeError> {
        self.ledger.begin().await.map_err(TradeError::TransactionFailed)
    }

    /// Reads the quote of `symbol`, refusing missing and stale ones.
    async fn tradable_quote(&self, symbol: &str) -> Result<Quote, TradeError> {
        let now = now_secs();
        let view = self
            .market
            .get_quote_at(symbol, now)
            .await
            .map_err(TradeError::from)?;
        if view.is_stale {
            return Err(TradeError::MarketClosed {
                symbol: symbol.to_string(),
                age_secs: view.quote.age_secs(now),
            });
        }
        Ok(view.quote)
    }

    async fn stage_sell(
        &self,
        session: &mut dyn LedgerSession,
        account_id: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<(Account, Decimal), TradeError> {
        let account = lock_account(session, account_id).await?;
        let held = session
            .lock_position(&account, symbol)
            .await
            .map_err(TradeError::TransactionFailed)?;

        let position = match held {
            Some(position) if position.quantity() >= quantity => position,
            other => {
                return Err(TradeError::InsufficientQuantity {
                    symbol: symbol.to_string(),
                    requested: quantity,
                    held: other.map(|p| p.quantity()).unwrap_or(Decimal::ZERO),
                })
            }
        };

        let quote = self.tradable_quote(symbol).await?;
        let balance = quote
            .price()
            .checked_mul(quantity)
            .and_then(|proceeds| account.account().balance().checked_add(proceeds))
            .ok_or_else(|| TradeError::AmountOverflow(symbol.to_string()))?;

        session
            .set_balance(&account, balance)
            .await
            .map_err(TradeError::TransactionFailed)?;
        let written = match position.after_sell(quantity) {
            Some(remaining) => session.save_position(&account, &remaining).await,
            None => session.delete_position(&account, symbol).await,
        };
        written.map_err(TradeError::TransactionFailed)?;

        Ok((account.account().with_balance(balance), quote.price()))
    }
}

fn validate_quantity(quantity: Decimal) -> Result<(), TradeError> {
    if quantity > Decimal::ZERO {
        Ok(())
    } else {
        Err(TradeError::InvalidQuantity(quantity))
    }
}

async fn lock_account(
    session: &mut dyn LedgerSession,
    account_id: AccountId,
) -> Result<LockedAccount, TradeError> {
    session
        .lock_account(account_id)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) => TradeError::AccountNotFound(account_id),
            other => TradeError::TransactionFailed(other),
        })
}

async fn stage_buy(
    session: &mut dyn LedgerSession,
    account_id: AccountId,
    quote: &Quote,
    quantity: Decimal,
) -> Result<Account, TradeError> {
    let account = lock_account(session, account_id).await?;
    let held = session
        .lock_position(&account, quote.symbol())
        .await
        .map_err(TradeError::TransactionFailed)?;

    // A cost past `Decimal::MAX` is unaffordable for any balance.
    let cost = quote.price().checked_mul(quantity).unwrap_or(Decimal::MAX);
    let available = account.account().balance();
    if available < cost {
        return Err(TradeError::InsufficientFunds {
            required: cost,
            available,
        });
    }

    let position = match held {
        Some(position) => position
            .after_buy(quantity, quote.price())
            .ok_or_else(|| TradeError::AmountOverflow(quote.symbol().to_string()))?,
        None => Position::opened(account_id, quote.symbol(), quantity, quote.price()),
    };
    let balance = available - cost;

    session
        .set_balance(&account, balance)
        .await
        .map_err(TradeError::TransactionFailed)?;
    session
        .save_position(&account, &position)
        .await
        .map_err(TradeError::TransactionFailed)?;

    Ok(account.account().with_balance(balance))
}

/// Commits when every staged step succeeded, rolls back otherwise.
async fn finish<T>(
    session: Box<dyn LedgerSession>,
    outcome: Result<T, TradeError>,
) -> Result<T, TradeError> {
    match outcome {
        Ok(value) => match session.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                warn!("Trade commit failed, rolled back: {}", err);
                Err(TradeError::TransactionFailed(err))
            }
        },
        Err(err) => {
            session.rollback().await;
            debug!("Trade rejected: {}", err);
            Err(err)
        }
    }
}
