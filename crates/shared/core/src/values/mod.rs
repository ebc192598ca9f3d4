use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Traded volume (lots/contracts) - uses Decimal for precision
pub type Volume = Decimal;

/// Account equity snapshot
pub type Equity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Symbol identifier for a tradeable instrument
pub type Symbol = String;

/// Ledger-assigned identifier of a filled leg
pub type LegId = u64;
