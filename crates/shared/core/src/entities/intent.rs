use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderType, Side};
use crate::values::{LegId, Price, Volume};

/// Unique identifier for an order intent
///
/// Assigned by the engine when an order is first placed; cancels and
/// replaces refer back to the same id.
pub type OrderId = Uuid;

/// What the gateway should do with an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentAction {
    Place,
    Cancel,
    Replace,
}

/// Why the engine wants this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentPurpose {
    /// Pending grid entry at a signed step offset from the reference
    GridEntry { level: i32 },
    /// Basket stop-loss
    StopLoss,
    /// Basket take-profit (tier 0 when not tiered)
    TakeProfit { tier: usize },
    /// Forced close of one leg (equity cut)
    CloseLeg { leg_id: LegId },
}

impl IntentPurpose {
    /// Protective orders exit an existing basket
    pub fn is_protective(&self) -> bool {
        matches!(self, IntentPurpose::StopLoss | IntentPurpose::TakeProfit { .. })
    }
}

/// Order instruction handed to the execution gateway
///
/// Placement is fire-and-forget: confirmation arrives later as a
/// [`FillEvent`](super::FillEvent) or a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub order_id: OrderId,
    pub action: IntentAction,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for Limit and Stop orders
    pub price: Option<Price>,
    pub volume: Volume,
    pub purpose: IntentPurpose,
}

impl OrderIntent {
    /// New order with a fresh id
    pub fn place(
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        volume: Volume,
        purpose: IntentPurpose,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            action: IntentAction::Place,
            side,
            order_type,
            price,
            volume,
            purpose,
        }
    }

    /// Cancel a previously placed order
    pub fn cancel(
        order_id: OrderId,
        side: Side,
        order_type: OrderType,
        purpose: IntentPurpose,
    ) -> Self {
        Self {
            order_id,
            action: IntentAction::Cancel,
            side,
            order_type,
            price: None,
            volume: Decimal::ZERO,
            purpose,
        }
    }

    /// Move a previously placed order to a new price/volume
    pub fn replace(
        order_id: OrderId,
        side: Side,
        order_type: OrderType,
        price: Price,
        volume: Volume,
        purpose: IntentPurpose,
    ) -> Self {
        Self {
            order_id,
            action: IntentAction::Replace,
            side,
            order_type,
            price: Some(price),
            volume,
            purpose,
        }
    }

    /// Validate the intent based on order type requirements
    pub fn validate(&self) -> bool {
        match (self.action, self.order_type) {
            (IntentAction::Cancel, _) => true,
            (_, OrderType::Market) => self.volume > Decimal::ZERO,
            (_, OrderType::Limit | OrderType::Stop) => {
                self.price.is_some() && self.volume > Decimal::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_place_requires_price_for_resting_orders() {
        let limit = OrderIntent::place(
            Side::Buy,
            OrderType::Limit,
            None,
            dec!(0.1),
            IntentPurpose::GridEntry { level: -1 },
        );
        assert!(!limit.validate());

        let market = OrderIntent::place(
            Side::Sell,
            OrderType::Market,
            None,
            dec!(0.1),
            IntentPurpose::CloseLeg { leg_id: 7 },
        );
        assert!(market.validate());
    }

    #[test]
    fn test_cancel_keeps_order_id() {
        let placed = OrderIntent::place(
            Side::Sell,
            OrderType::Stop,
            Some(dec!(99)),
            dec!(1),
            IntentPurpose::StopLoss,
        );
        let cancel = OrderIntent::cancel(
            placed.order_id,
            placed.side,
            placed.order_type,
            placed.purpose,
        );
        assert_eq!(cancel.order_id, placed.order_id);
        assert_eq!(cancel.action, IntentAction::Cancel);
        assert!(cancel.validate());
        assert!(placed.purpose.is_protective());
    }
}
