mod simulator;

use anyhow::{Context, Result};
use log::{info, warn};
use simulator::Simulator;
use tokio_util::sync::CancellationToken;
use trading_core::args::CommonArgs;
use trading_core::config::SimulatorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse_args(std::env::args_os());
    let mut config = SimulatorConfig::load(args.config_path())?;
    args.apply(&mut config);

    trading_core::logging::init(&config.log_level).context("Failed to install logger")?;
    info!("=== Paper Trading Simulator Starting ===");

    let simulator = Simulator::new(config);
    let seeded = simulator.seed_accounts().await?;
    info!("Seeded {} accounts", seeded);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!("Cannot listen for Ctrl-C ({}), shutting down", e),
        }
        shutdown.cancel();
    });

    let summary = simulator.run(cancel).await?;
    for (source, stats) in &summary.fetch {
        info!("Group {}: {:?}", source, stats);
    }
    info!(
        "Leaderboard updates: {}, history: {:?}",
        summary.leaderboard_updates, summary.history
    );
    info!("=== Paper Trading Simulator Stopped ===");
    Ok(())
}
