//! Basket Clock Infrastructure
//!
//! Provides time sources for live and replayed operation:
//!
//! - [`SystemClock`]: wall-clock time for live trading
//! - [`ManualClock`]: only moves when told to; replays follow tick
//!   timestamps with it and tests advance it explicitly
//!
//! ## Usage
//!
//! ```ignore
//! use basket_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(start);
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now(), start + Duration::minutes(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use basket_ports::Clock;
