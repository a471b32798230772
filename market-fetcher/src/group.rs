//! One provider's polling loop.

use crate::history::HistoryHandle;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use trading::{ProviderError, Quote, QuoteCache, QuoteProvider, QuoteRecord};
use trading_core::clock::now_secs;

#[derive(Debug, Clone, Copy)]
pub struct GroupSettings {
    /// Pause after every request, successful or not.
    pub request_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A new quote was cached and published.
    Stored(Quote),
    /// Same price and timestamp as the last cached quote; nothing written.
    Unchanged,
    Failed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub stored: u64,
    pub unchanged: u64,
    pub failed: u64,
    /// Full passes over the symbol list.
    pub rounds: u64,
}

pub struct FetcherGroup {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<dyn QuoteCache>,
    history: Option<HistoryHandle>,
    symbols: Vec<String>,
    settings: GroupSettings,
    last_cached: HashMap<String, Quote>,
    stats: FetchStats,
}

impl FetcherGroup {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        cache: Arc<dyn QuoteCache>,
        symbols: Vec<String>,
        settings: GroupSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            history: None,
            symbols,
            settings,
            last_cached: HashMap::new(),
            stats: FetchStats::default(),
        }
    }

    pub fn with_history(mut self, history: HistoryHandle) -> Self {
        self.history = Some(history);
        self
    }

    pub fn source(&self) -> &str {
        self.provider.source()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Polls the symbols in order until `cancel` fires.
    ///
    /// Cancellation is checked before every request and during every delay, so
    /// shutdown waits for at most one in-flight request.
    pub async fn run(mut self, cancel: CancellationToken) -> FetchStats {
        if self.symbols.is_empty() {
            return self.stats;
        }
        info!(
            "Fetcher group {} started for {:?} (delay {:?})",
            self.source(),
            self.symbols,
            self.settings.request_delay
        );

        'polling: loop {
            for i in 0..self.symbols.len() {
                if cancel.is_cancelled() {
                    break 'polling;
                }
                let symbol = self.symbols[i].clone();
                self.tick(&symbol).await;

                tokio::select! {
                    _ = cancel.cancelled() => break 'polling,
                    _ = sleep(self.settings.request_delay) => {}
                }
            }
            self.stats.rounds += 1;
        }

        info!(
            "Fetcher group {} stopped: {:?}",
            self.source(),
            self.stats
        );
        self.stats
    }

    /// Fetches one symbol and caches it unless it repeats the last cached tick.
    pub async fn tick(&mut self, symbol: &str) -> TickOutcome {
        let outcome = self.fetch_and_store(symbol).await;
        match &outcome {
            TickOutcome::Stored(_) => self.stats.stored += 1,
            TickOutcome::Unchanged => self.stats.unchanged += 1,
            TickOutcome::Failed => self.stats.failed += 1,
        }
        outcome
    }

    async fn fetch_and_store(&mut self, symbol: &str) -> TickOutcome {
        let quote = match self.fetch(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("[{}] Fetch failed: {}", symbol, e);
                return TickOutcome::Failed;
            }
        };

        if self
            .last_cached
            .get(symbol)
            .is_some_and(|last| last.same_tick(&quote))
        {
            debug!("[{}] Unchanged at {}", symbol, quote.price());
            return TickOutcome::Unchanged;
        }

        if let Err(e) = self.cache.save_quote(&quote).await {
            error!("[{}] Cache write failed: {}", symbol, e);
            return TickOutcome::Failed;
        }
        info!(
            "[{}] Updated: {} (ts: {})",
            symbol,
            quote.price(),
            quote.timestamp()
        );

        if let Some(history) = &self.history {
            history.record(QuoteRecord::new(quote.clone(), now_secs()));
        }
        self.last_cached.insert(symbol.to_string(), quote.clone());
        TickOutcome::Stored(quote)
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let fetched_at = now_secs();
        let mut raw = timeout(self.settings.request_timeout, self.provider.get_quote(symbol))
            .await
            .map_err(|_| ProviderError::Timeout(self.settings.request_timeout))??;
        raw.symbol = symbol.to_string();

        if raw.price <= Decimal::ZERO {
            return Err(ProviderError::InvalidQuote {
                symbol: symbol.to_string(),
                reason: "non-positive price (market closed or rate limited)".into(),
            });
        }
        let quote = Quote::from_provider(raw, self.provider.source(), fetched_at);
        if quote.price() <= Decimal::ZERO {
            return Err(ProviderError::InvalidQuote {
                symbol: symbol.to_string(),
                reason: "price below currency precision".into(),
            });
        }
        Ok(quote)
    }
}
