//! # Execution Engine
//!
//! Executes buy and sell orders against the cached market price, atomically
//! updating the account balance and position inside one ledger session.

pub mod engine;

pub use engine::{Engine, Side};
