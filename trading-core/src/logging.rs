//! Logger initialisation shared by the binaries.

/// Installs `env_logger`, honouring `RUST_LOG` and falling back to `default_level`.
pub fn init(default_level: &str) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init()
}
