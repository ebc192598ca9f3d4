use basket_core::{FillEvent, OrderIntent, Tick};

use crate::error::GatewayResult;

/// Port to the host's order execution layer
///
/// Submission is fire-and-forget: `Ok(())` means the intent was handed
/// over, not that it executed. Fills and asynchronous rejections come back
/// through the host's event queue. Cancelling an order that is already
/// filled or cancelled must be a no-op.
pub trait ExecutionGateway: Send {
    /// Hand one intent to the execution layer
    fn submit(&mut self, intent: &OrderIntent) -> GatewayResult<()>;

    /// Executions triggered by a new market price
    ///
    /// Simulated venues match their resting orders here. Live gateways
    /// report fills through the host's queue and keep the default.
    fn poll_fills(&mut self, _tick: &Tick) -> Vec<FillEvent> {
        Vec::new()
    }

    /// Gateway name for logging
    fn name(&self) -> &str {
        "ExecutionGateway"
    }
}
