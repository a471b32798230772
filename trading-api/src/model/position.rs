//! Holdings of one symbol by one account.
//!
//! Cost basis is a volume-weighted moving average: buys blend into the average,
//! sells leave it untouched. There is no lot tracking.

use super::ids::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    account_id: AccountId,
    symbol: String,
    quantity: Decimal,
    average_cost: Decimal,
}

impl Position {
    pub fn new(
        account_id: AccountId,
        symbol: impl Into<String>,
        quantity: Decimal,
        average_cost: Decimal,
    ) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            quantity,
            average_cost,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn average_cost(&self) -> Decimal {
        self.average_cost
    }

    /// Opens a position from a first buy.
    pub fn opened(account_id: AccountId, symbol: &str, quantity: Decimal, price: Decimal) -> Self {
        Self::new(account_id, symbol, quantity, price)
    }

    /// Position after buying `quantity` more at `price`, or `None` on overflow.
    ///
    /// `new_avg = (old_qty * old_avg + quantity * price) / (old_qty + quantity)`
    pub fn after_buy(&self, quantity: Decimal, price: Decimal) -> Option<Self> {
        let total_quantity = self.quantity.checked_add(quantity)?;
        let total_cost = self
            .quantity
            .checked_mul(self.average_cost)?
            .checked_add(quantity.checked_mul(price)?)?;
        Some(Self {
            quantity: total_quantity,
            average_cost: total_cost.checked_div(total_quantity)?,
            ..self.clone()
        })
    }

    /// Position after selling `quantity`, or `None` when nothing is left.
    ///
    /// Callers check `quantity <= self.quantity()` first.
    pub fn after_sell(&self, quantity: Decimal) -> Option<Self> {
        let remaining = self.quantity - quantity;
        if remaining.is_zero() {
            None
        } else {
            Some(Self {
                quantity: remaining,
                ..self.clone()
            })
        }
    }

    /// Mark-to-market value at `price`, or `None` on overflow.
    pub fn market_value(&self, price: Decimal) -> Option<Decimal> {
        self.quantity.checked_mul(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn aapl(quantity: Decimal, average_cost: Decimal) -> Position {
        Position::new(AccountId::new(1), "AAPL", quantity, average_cost)
    }

    #[test]
    fn test_weighted_average_is_exact() {
        let p = Position::opened(AccountId::new(1), "AAPL", dec!(2), dec!(150.0));
        let p = p.after_buy(dec!(3), dec!(100.0)).unwrap();
        assert_eq!(p.quantity(), dec!(5));
        assert_eq!(p.average_cost(), dec!(120));
    }

    #[test]
    fn test_sell_keeps_average_cost() {
        let p = aapl(dec!(5), dec!(120)).after_sell(dec!(2)).unwrap();
        assert_eq!(p.quantity(), dec!(3));
        assert_eq!(p.average_cost(), dec!(120));
    }

    #[test]
    fn test_sell_to_zero_closes_position() {
        assert!(aapl(dec!(2.5), dec!(10)).after_sell(dec!(2.5)).is_none());
    }

    #[test]
    fn test_fractional_quantities() {
        let p = aapl(dec!(0.5), dec!(100))
            .after_buy(dec!(0.5), dec!(200))
            .unwrap();
        assert_eq!(p.quantity(), dec!(1.0));
        assert_eq!(p.average_cost(), dec!(150));
        assert_eq!(p.market_value(dec!(300)), Some(dec!(300)));
    }

    #[test]
    fn test_overflow_yields_none() {
        let huge = aapl(Decimal::MAX / dec!(10), dec!(1));
        assert_eq!(huge.market_value(dec!(150)), None);
        assert!(huge.after_buy(Decimal::MAX / dec!(10), dec!(150)).is_none());
    }
}
