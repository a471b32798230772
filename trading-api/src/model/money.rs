use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds `amount` to currency precision, half away from zero.
pub fn to_currency_precision(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounds_to_nearest_cent() {
        assert_eq!(to_currency_precision(dec!(151.239)), dec!(151.24));
        assert_eq!(to_currency_precision(dec!(150.231)), dec!(150.23));
        assert_eq!(to_currency_precision(dec!(0.999)), dec!(1.00));
        assert_eq!(to_currency_precision(dec!(42)), dec!(42));
    }

    #[test]
    fn test_half_cent_rounds_away_from_zero() {
        assert_eq!(to_currency_precision(dec!(0.125)), dec!(0.13));
        assert_eq!(to_currency_precision(dec!(0.135)), dec!(0.14));
        assert_eq!(to_currency_precision(dec!(-0.125)), dec!(-0.13));
    }
}
