//! Command-line arguments shared by the simulator binaries.
//!
//! Flags given here win over both the configuration file and the environment.

use crate::config::SimulatorConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct CommonArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "market_fetcher=debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Append quote history to this CSV file instead of keeping it in memory
    #[arg(long)]
    history_path: Option<PathBuf>,
}

impl CommonArgs {
    /// Parses arguments from an explicit list. The first item is the program name.
    pub fn parse_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        CommonArgs::parse_from(args)
    }

    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config.as_deref()
    }

    /// Writes the command-line overrides into `config`.
    pub fn apply(&self, config: &mut SimulatorConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(path) = &self.history_path {
            config.fetcher.history_path = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = CommonArgs::parse_args([
            "sim",
            "--config",
            "sim.toml",
            "--log-level",
            "debug",
            "--history-path",
            "/tmp/history.csv",
        ]);
        assert_eq!(args.config_path(), Some(std::path::Path::new("sim.toml")));

        let mut config = SimulatorConfig::default();
        args.apply(&mut config);
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.fetcher.history_path,
            Some(PathBuf::from("/tmp/history.csv"))
        );
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = CommonArgs::parse_args(["sim"]);
        let mut config = SimulatorConfig::default();
        args.apply(&mut config);
        assert_eq!(config.log_level, "info");
        assert!(config.fetcher.history_path.is_none());
    }
}
