use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderId, Side};
use crate::values::{Equity, LegId, Price, Timestamp, Volume};

/// Events published for supervisors/operators
///
/// Telemetry never drives engine state; it is a read-only record of what
/// the engine decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    LegOpened {
        leg_id: LegId,
        side: Side,
        price: Price,
        volume: Volume,
        timestamp: Timestamp,
    },
    BasketClosed {
        side: Side,
        realized_volume: Volume,
        realized_pnl: Decimal,
        timestamp: Timestamp,
    },
    EquityTriggerFired {
        equity: Equity,
        baseline: Equity,
        upper_target: Equity,
        lower_stop: Equity,
        legs: Vec<LegId>,
    },
    GridRebuilt {
        reference: Price,
        levels: usize,
    },
    /// Grid construction paused: price jumped too far from the last accepted reference
    StaleReference {
        price: Price,
        reference: Price,
    },
    ExecutionRejected {
        order_id: OrderId,
        reason: String,
    },
}

impl TelemetryEvent {
    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::LegOpened { .. } => "LegOpened",
            TelemetryEvent::BasketClosed { .. } => "BasketClosed",
            TelemetryEvent::EquityTriggerFired { .. } => "EquityTriggerFired",
            TelemetryEvent::GridRebuilt { .. } => "GridRebuilt",
            TelemetryEvent::StaleReference { .. } => "StaleReference",
            TelemetryEvent::ExecutionRejected { .. } => "ExecutionRejected",
        }
    }
}
