//! Synthetic quote provider.
//!
//! Simulates a simple random walk per symbol: every request moves the price by
//! at most `volatility` (relative) in either direction.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use trading::{ProviderError, ProviderQuote, QuoteProvider};
use trading_core::clock::now_secs;

const FLOOR_PRICE: f64 = 0.01;

pub struct RandomWalkProvider {
    source: String,
    start_price: f64,
    volatility: f64,
    state: Mutex<WalkState>,
}

struct WalkState {
    rng: StdRng,
    prices: HashMap<String, f64>,
}

impl RandomWalkProvider {
    pub fn new(source: impl Into<String>, start_price: f64, volatility: f64) -> Self {
        Self::with_rng(source, start_price, volatility, StdRng::from_entropy())
    }

    /// Same walk on every run for a given seed.
    pub fn seeded(source: impl Into<String>, start_price: f64, volatility: f64, seed: u64) -> Self {
        Self::with_rng(source, start_price, volatility, StdRng::seed_from_u64(seed))
    }

    fn with_rng(source: impl Into<String>, start_price: f64, volatility: f64, rng: StdRng) -> Self {
        Self {
            source: source.into(),
            start_price: start_price.max(FLOOR_PRICE),
            volatility: volatility.abs(),
            state: Mutex::new(WalkState {
                rng,
                prices: HashMap::new(),
            }),
        }
    }

    fn step(&self, symbol: &str) -> Result<f64, ProviderError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProviderError::Request("random walk state poisoned".into()))?;
        let change = state.rng.gen_range(-self.volatility..=self.volatility);
        let price = state
            .prices
            .entry(symbol.to_string())
            .or_insert(self.start_price);
        *price = (*price * (1.0 + change)).max(FLOOR_PRICE);
        Ok(*price)
    }
}

#[async_trait]
impl QuoteProvider for RandomWalkProvider {
    fn source(&self) -> &str {
        &self.source
    }

    async fn get_quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
        let price = self.step(symbol)?;
        let price = Decimal::from_f64(price).ok_or_else(|| ProviderError::InvalidQuote {
            symbol: symbol.to_string(),
            reason: format!("price {price} is not representable"),
        })?;
        Ok(ProviderQuote::new(symbol, price, Some(now_secs())))
    }
}
