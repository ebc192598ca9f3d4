use serde::{Deserialize, Serialize};

use super::{OrderId, Side};
use crate::values::{Price, Timestamp, Volume};

/// Execution-layer identifier of a fill, used for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FillId(pub String);

impl FillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FillId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FillId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A fill notification from the execution layer
///
/// The same notification may be delivered more than once; consumers
/// deduplicate on `fill_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub fill_id: FillId,
    /// Engine order this fill belongs to, if it originated from an intent
    pub order_id: Option<OrderId>,
    pub side: Side,
    pub price: Price,
    pub volume: Volume,
    pub timestamp: Timestamp,
}

impl FillEvent {
    pub fn new(
        fill_id: impl Into<FillId>,
        side: Side,
        price: Price,
        volume: Volume,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            fill_id: fill_id.into(),
            order_id: None,
            side,
            price,
            volume,
            timestamp,
        }
    }

    /// Attach the engine order id this fill executes
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}
