//! Basket Ports
//!
//! Port definitions (traits) for the basket engine's host runtime.
//! These define the boundaries between engine logic and infrastructure:
//! where time comes from, where order intents go, and who hears telemetry.

mod clock;
mod error;
mod gateway;
mod telemetry;

pub use clock::Clock;
pub use error::{GatewayError, GatewayResult};
pub use gateway::ExecutionGateway;
pub use telemetry::TelemetrySink;
