use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Price;

/// Order / basket side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for Buy, -1 for Sell
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    /// Price `distance` away from `price` in this side's profit direction
    pub fn toward_profit(&self, price: Price, distance: Decimal) -> Price {
        price + self.sign() * distance
    }

    /// Price `distance` away from `price` in this side's loss direction
    pub fn toward_loss(&self, price: Price, distance: Decimal) -> Price {
        price - self.sign() * distance
    }

    /// P&L per unit for a position on this side entered at `entry` and marked at `exit`
    pub fn pnl_per_unit(&self, entry: Price, exit: Price) -> Decimal {
        self.sign() * (exit - entry)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_offsets_follow_side() {
        assert_eq!(Side::Buy.toward_profit(dec!(1.1010), dec!(0.0020)), dec!(1.1030));
        assert_eq!(Side::Buy.toward_loss(dec!(1.1010), dec!(0.0030)), dec!(1.0980));
        assert_eq!(Side::Sell.toward_profit(dec!(100), dec!(5)), dec!(95));
        assert_eq!(Side::Sell.toward_loss(dec!(100), dec!(5)), dec!(105));
    }

    #[test]
    fn test_pnl_per_unit() {
        assert_eq!(Side::Buy.pnl_per_unit(dec!(100), dec!(90)), dec!(-10));
        assert_eq!(Side::Sell.pnl_per_unit(dec!(100), dec!(90)), dec!(10));
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }
}
