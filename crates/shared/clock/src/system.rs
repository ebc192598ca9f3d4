use basket_core::Timestamp;
use basket_ports::Clock;
use chrono::Utc;

/// Wall-clock time for live sessions
///
/// Pending-order expiration and periodic sweeps read this when the engine
/// is fed by a live price stream.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
