//! # Trading Core Library
//!
//! Shared runtime foundation of the simulator services.
//!
//! ## Modules
//! - `store`: In-process store engines (quote cache with pub/sub, row-locking ledger,
//!   ranked set, history logs) behind the `trading` traits.
//! - `market`: Allow-listed, staleness-aware quote reads.
//! - `comms`: Streaming delivery of quote updates with heartbeats.
//! - `config`: Layered configuration (file + environment).
//! - `args`: Standardized command-line arguments.
//! - `logging`: Logger initialisation.

pub mod args;
pub mod clock;
pub mod comms;
pub mod config;
pub mod logging;
pub mod market;
pub mod store;

pub use market::MarketData;
