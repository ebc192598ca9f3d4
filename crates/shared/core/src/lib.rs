//! Basket Core Domain
//!
//! Pure domain types shared by the grid/basket engine and its host runtime.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod instruments;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    EntrySignal, FillEvent, FillId, IntentAction, IntentPurpose, OrderId, OrderIntent, OrderType,
    Side, TelemetryEvent, Tick,
};
pub use instruments::{Instrument, InstrumentSpec};
pub use values::{Equity, LegId, Price, Symbol, Timestamp, Volume};
