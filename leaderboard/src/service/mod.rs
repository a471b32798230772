use crate::error::LeaderboardError;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use trading::{
    Account, AccountId, LeaderboardEntry, LeaderboardPage, Ledger, QuoteCache, RankedSet,
};
use trading_core::clock::now_secs;

/// Outcome of one recompute.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub ranked: usize,
    /// Accounts whose holdings could not be read. Their previous score stays.
    pub failed: usize,
    /// Holdings left out because their symbol had no cached price.
    pub skipped_holdings: usize,
}

pub struct LeaderboardService {
    ledger: Arc<dyn Ledger>,
    quotes: Arc<dyn QuoteCache>,
    ranking: Arc<dyn RankedSet>,
}

/// Prices read during one computation, so every account of a cycle is marked at
/// the same price. `None` records a symbol without a cached quote.
type PriceBook = HashMap<String, Option<Decimal>>;

impl LeaderboardService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        quotes: Arc<dyn QuoteCache>,
        ranking: Arc<dyn RankedSet>,
    ) -> Self {
        Self {
            ledger,
            quotes,
            ranking,
        }
    }

    /// Recomputes and stores the score of every account.
    ///
    /// Fails only when the account list itself cannot be read; a failing account
    /// is logged and skipped.
    pub async fn update_leaderboard(&self) -> Result<UpdateReport, LeaderboardError> {
        let accounts = self.ledger.list_accounts().await?;
        let mut prices = PriceBook::new();
        let mut report = UpdateReport::default();

        for account in &accounts {
            let score = match self.score(account, &mut prices).await {
                Ok((score, skipped)) => {
                    report.skipped_holdings += skipped;
                    score
                }
                Err(e) => {
                    warn!("Skipping account {} in leaderboard update: {}", account.id(), e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.ranking.upsert(account.id(), score).await {
                Ok(()) => report.ranked += 1,
                Err(e) => {
                    warn!("Failed to rank account {}: {}", account.id(), e);
                    report.failed += 1;
                }
            }
        }

        self.ranking.mark_updated(now_secs()).await?;
        info!(
            "Leaderboard updated: {} ranked, {} failed, {} holdings without price",
            report.ranked, report.failed, report.skipped_holdings
        );
        Ok(report)
    }

    /// Current net worth of one account, with the same rules as the ranking.
    pub async fn net_worth(&self, account_id: AccountId) -> Result<Decimal, LeaderboardError> {
        let account = self
            .ledger
            .get_account(account_id)
            .await?
            .ok_or(LeaderboardError::AccountNotFound(account_id))?;
        let (score, _) = self.score(&account, &mut PriceBook::new()).await?;
        Ok(score)
    }

    /// Reads a page of the ranking, best first.
    ///
    /// Entries whose account no longer exists are removed from the ranking on
    /// the spot and not counted in `total_count`.
    pub async fn get_leaderboard(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<LeaderboardPage, LeaderboardError> {
        let mut total_count = self.ranking.count().await?;
        let last_update = self.ranking.last_updated().await?;
        let ranked = self.ranking.range_desc(offset, limit).await?;

        let mut entries = Vec::with_capacity(ranked.len());
        for (account_id, score) in ranked {
            match self.ledger.get_account(account_id).await? {
                Some(account) => {
                    let profile = account.profile();
                    entries.push(LeaderboardEntry {
                        account_id,
                        username: profile.username.clone(),
                        first_name: profile.first_name.clone(),
                        last_name: profile.last_name.clone(),
                        total_net_worth: score,
                        rank: offset + entries.len() + 1,
                    });
                }
                None => {
                    if self.ranking.remove(account_id).await? {
                        total_count = total_count.saturating_sub(1);
                    }
                    info!("Evicted stale leaderboard entry for account {}", account_id);
                }
            }
        }

        Ok(LeaderboardPage {
            entries,
            total_count,
            last_update,
        })
    }

    async fn score(
        &self,
        account: &Account,
        prices: &mut PriceBook,
    ) -> Result<(Decimal, usize), LeaderboardError> {
        let positions = self.ledger.positions(account.id()).await?;
        let mut total = account.balance();
        let mut skipped = 0;

        for position in positions {
            match self.price(position.symbol(), prices).await {
                Some(price) => {
                    total = position
                        .market_value(price)
                        .and_then(|value| total.checked_add(value))
                        .ok_or(LeaderboardError::Overflow(account.id()))?;
                }
                None => {
                    debug!(
                        "No price for {} held by account {}",
                        position.symbol(),
                        account.id()
                    );
                    skipped += 1;
                }
            }
        }
        Ok((total, skipped))
    }

    async fn price(&self, symbol: &str, prices: &mut PriceBook) -> Option<Decimal> {
        if let Some(known) = prices.get(symbol) {
            return *known;
        }
        let price = match self.quotes.get_quote(symbol).await {
            Ok(quote) => quote.map(|q| q.price()),
            Err(e) => {
                warn!("Quote read for {} failed: {}", symbol, e);
                None
            }
        };
        prices.insert(symbol.to_string(), price);
        price
    }
}
