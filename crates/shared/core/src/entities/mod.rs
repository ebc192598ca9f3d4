mod fill;
mod intent;
mod order_type;
mod side;
mod telemetry;
mod tick;

pub use fill::{FillEvent, FillId};
pub use intent::{IntentAction, IntentPurpose, OrderId, OrderIntent};
pub use order_type::OrderType;
pub use side::Side;
pub use telemetry::TelemetryEvent;
pub use tick::{EntrySignal, Tick};
