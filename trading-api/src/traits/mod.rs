pub mod history;
pub mod ledger;
pub mod quote_cache;
pub mod quote_provider;
pub mod ranking;
