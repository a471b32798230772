//! Builds every component from configuration and runs the background tasks.

use anyhow::Result;
use execution_engine::Engine;
use futures::future::join_all;
use leaderboard::{run_worker, LeaderboardService};
use log::{debug, info, warn};
use market_fetcher::{
    partition_symbols, FetchStats, FetcherGroup, GroupSettings, HistoryStats, HistoryWriter,
    RandomWalkProvider,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trading::{HistoryLog, Profile, StoreError};
use trading_core::comms::{deliver_quotes, StreamEvent};
use trading_core::config::{ProviderConfig, SimulatorConfig};
use trading_core::store::{
    CsvHistoryLog, MemoryHistoryLog, MemoryLedger, MemoryQuoteCache, MemoryRankedSet,
};
use trading_core::MarketData;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub fetch: Vec<(String, FetchStats)>,
    pub leaderboard_updates: u64,
    pub history: HistoryStats,
}

pub struct Simulator {
    config: SimulatorConfig,
    cache: Arc<MemoryQuoteCache>,
    history: Arc<dyn HistoryLog>,
    market: MarketData,
    engine: Engine,
    leaderboard: Arc<LeaderboardService>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let cache = Arc::new(MemoryQuoteCache::new(config.market.channel_capacity));
        let ledger = Arc::new(MemoryLedger::new());
        let ranking = Arc::new(MemoryRankedSet::new());
        let history: Arc<dyn HistoryLog> = match &config.fetcher.history_path {
            Some(path) => {
                info!("Recording quote history to {}", path.display());
                Arc::new(CsvHistoryLog::new(path.clone()))
            }
            None => Arc::new(MemoryHistoryLog::new()),
        };

        let market = MarketData::new(
            cache.clone(),
            config.market.symbols.clone(),
            config.market.staleness_window(),
        );
        let engine = Engine::new(
            market.clone(),
            ledger.clone(),
            config.accounts.initial_balance,
        );
        let leaderboard = Arc::new(LeaderboardService::new(ledger, cache.clone(), ranking));

        Self {
            config,
            cache,
            history,
            market,
            engine,
            leaderboard,
        }
    }

    /// Registers the configured accounts. Existing usernames are skipped.
    pub async fn seed_accounts(&self) -> Result<usize> {
        let mut created = 0;
        for seed in &self.config.accounts.seed {
            let profile = Profile::new(&seed.username, &seed.first_name, &seed.last_name);
            match self.engine.open_account(profile).await {
                Ok(_) => created += 1,
                Err(StoreError::Constraint(reason)) => {
                    warn!("Skipping seed account {}: {}", seed.username, reason)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }

    fn provider_for(&self, source: &str) -> ProviderConfig {
        self.config
            .fetcher
            .provider(source)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(source, 100.0))
    }

    /// Runs fetch groups, the leaderboard worker and quote tapes until `cancel`
    /// fires, then waits for all of them and drains the history queue.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let fetcher = &self.config.fetcher;
        let (writer, history) = HistoryWriter::spawn(
            self.history.clone(),
            fetcher.history_queue_capacity,
            fetcher.history_timeout(),
        );

        let mut sources: Vec<&str> = fetcher.providers.iter().map(|p| p.source.as_str()).collect();
        sources.push(fetcher.default_source.as_str());
        let groups = partition_symbols(&self.config.market.symbols, &sources, &fetcher.default_source);

        let mut fetch_tasks = Vec::new();
        for (source, symbols) in groups {
            let provider_config = self.provider_for(&source);
            let provider = Arc::new(RandomWalkProvider::new(
                source.clone(),
                provider_config.start_price,
                provider_config.volatility,
            ));
            let settings = GroupSettings {
                request_delay: fetcher.delay_for(&provider_config),
                request_timeout: fetcher.request_timeout(),
            };
            let group = FetcherGroup::new(provider, self.cache.clone(), symbols, settings)
                .with_history(history.clone());
            let task = tokio::spawn(group.run(cancel.clone()));
            fetch_tasks.push((source, task));
        }
        drop(history);

        let tape_tasks = self.spawn_tapes(&cancel).await?;

        let worker = tokio::spawn(run_worker(
            self.leaderboard.clone(),
            self.config.leaderboard.refresh_interval(),
            cancel.clone(),
        ));
        info!(
            "Running {} fetch groups and the leaderboard worker",
            fetch_tasks.len()
        );

        let (sources, tasks): (Vec<_>, Vec<_>) = fetch_tasks.into_iter().unzip();
        let mut summary = RunSummary::default();
        for (source, joined) in sources.into_iter().zip(join_all(tasks).await) {
            summary.fetch.push((source, joined?));
        }
        summary.leaderboard_updates = worker.await?;
        join_all(tape_tasks).await;

        // Every history handle is gone once the groups have returned.
        summary.history = writer.finish().await;
        Ok(summary)
    }

    /// Logs every quote published for the tracked symbols.
    async fn spawn_tapes(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>> {
        let mut tasks = Vec::new();
        for symbol in self.market.tracked() {
            let subscription = self.market.subscribe(symbol).await?;
            let (sink, mut events) = mpsc::channel(self.config.market.channel_capacity.max(1));
            let heartbeat = self.config.market.heartbeat();
            let cancel = cancel.clone();

            tasks.push(tokio::spawn(async move {
                let delivery = tokio::spawn(deliver_quotes(subscription, sink, heartbeat, cancel));
                while let Some(event) = events.recv().await {
                    match event {
                        StreamEvent::Quote(quote) => debug!(
                            "TAPE {} {} ({})",
                            quote.symbol(),
                            quote.price(),
                            quote.source()
                        ),
                        StreamEvent::Heartbeat => debug!("TAPE heartbeat"),
                    }
                }
                if let Err(e) = delivery.await {
                    warn!("Quote tape failed: {}", e);
                }
            }));
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use trading::QuoteCache;
    use trading_core::config::SeedAccount;

    fn test_config() -> SimulatorConfig {
        let mut config = SimulatorConfig::default();
        config.market.symbols = vec!["AAPL".into(), "CG:bitcoin".into()];
        config.fetcher.request_delay_ms = 100;
        config.leaderboard.refresh_secs = 1;
        config.accounts.seed = vec![
            SeedAccount {
                username: "ada".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
            },
            SeedAccount {
                username: "ada".into(),
                first_name: "Again".into(),
                last_name: String::new(),
            },
        ];
        config
    }

    #[tokio::test]
    async fn test_duplicate_seed_accounts_are_skipped() {
        let simulator = Simulator::new(test_config());
        assert_eq!(simulator.seed_accounts().await.unwrap(), 1);
        assert_eq!(simulator.seed_accounts().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_cancelled() {
        let simulator = Simulator::new(test_config());
        simulator.seed_accounts().await.unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_050)).await;
            stopper.cancel();
        });

        let summary = simulator.run(cancel).await.unwrap();

        let sources: Vec<&str> = summary.fetch.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, vec!["CG", "FH"]);
        assert!(summary.fetch.iter().all(|(_, stats)| stats.stored > 0));
        assert!(summary.leaderboard_updates >= 2);
        assert_eq!(summary.history.written, summary.fetch.iter().map(|(_, s)| s.stored).sum::<u64>());

        assert!(simulator.cache.get_quote("AAPL").await.unwrap().is_some());
        assert!(simulator.cache.get_quote("CG:bitcoin").await.unwrap().is_some());
        let page = simulator.leaderboard.get_leaderboard(0, 10).await.unwrap();
        assert_eq!(page.total_count, 1);
    }
}
