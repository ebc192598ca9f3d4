use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::{Price, Timestamp};

/// One price update (tick or closed candle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: Price,
    pub ask: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub timestamp: Timestamp,
}

impl Tick {
    /// Quote-only tick: high/low/close are derived from the quote
    pub fn from_quote(bid: Price, ask: Price, timestamp: Timestamp) -> Self {
        Self {
            bid,
            ask,
            high: ask.max(bid),
            low: bid.min(ask),
            close: (bid + ask) / Decimal::TWO,
            timestamp,
        }
    }

    pub fn mid(&self) -> Price {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Price at which a position on `side` would be exited now
    pub fn exit_price(&self, side: Side) -> Price {
        match side {
            Side::Buy => self.bid,
            Side::Sell => self.ask,
        }
    }

    /// Price at which a new entry on `side` would execute now
    pub fn entry_price(&self, side: Side) -> Price {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }

    /// Whether `price` lies inside this bar's high/low range
    pub fn contains(&self, price: Price) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Entry permission supplied by an external signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub allow_long: bool,
    pub allow_short: bool,
}

impl EntrySignal {
    pub fn both() -> Self {
        Self {
            allow_long: true,
            allow_short: true,
        }
    }

    pub fn long_only() -> Self {
        Self {
            allow_long: true,
            allow_short: false,
        }
    }

    pub fn short_only() -> Self {
        Self {
            allow_long: false,
            allow_short: true,
        }
    }

    pub fn allows(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.allow_long,
            Side::Sell => self.allow_short,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_tick_derives_range() {
        let tick = Tick::from_quote(dec!(1.1000), dec!(1.1002), Utc::now());
        assert_eq!(tick.mid(), dec!(1.1001));
        assert_eq!(tick.low, dec!(1.1000));
        assert_eq!(tick.high, dec!(1.1002));
        assert!(tick.contains(dec!(1.1001)));
        assert!(!tick.contains(dec!(1.1003)));
        assert_eq!(tick.exit_price(Side::Buy), dec!(1.1000));
        assert_eq!(tick.exit_price(Side::Sell), dec!(1.1002));
    }
}
