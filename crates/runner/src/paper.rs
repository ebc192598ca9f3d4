//! Paper gateway - fills resting intents against replayed prices
//!
//! Orders rest until a tick crosses them:
//! - Market: next tick
//! - Limit buy / stop sell: when the executable price falls to the order price
//! - Limit sell / stop buy: when the executable price rises to the order price
//!
//! Every execution happens at the tick's executable price for the order's
//! side (ask for buys, bid for sells), so gaps fill at the market.

use basket_core::{
    FillEvent, IntentAction, OrderId, OrderIntent, OrderType, Price, Side, Tick,
};
use basket_ports::{ExecutionGateway, GatewayError, GatewayResult};
use log::{debug, info};

#[derive(Debug, Default)]
pub struct PaperGateway {
    resting: Vec<OrderIntent>,
    next_fill: u64,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders waiting for a price, in submission order
    pub fn resting(&self) -> &[OrderIntent] {
        &self.resting
    }

    pub fn order(&self, order_id: OrderId) -> Option<&OrderIntent> {
        self.resting.iter().find(|o| o.order_id == order_id)
    }

    fn execution_price(order: &OrderIntent, tick: &Tick) -> Option<Price> {
        let market = tick.entry_price(order.side);
        let crossed = match (order.order_type, order.price) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, Some(limit)) => match order.side {
                Side::Buy => market <= limit,
                Side::Sell => market >= limit,
            },
            (OrderType::Stop, Some(stop)) => match order.side {
                Side::Buy => market >= stop,
                Side::Sell => market <= stop,
            },
            _ => false,
        };
        crossed.then_some(market)
    }
}

impl ExecutionGateway for PaperGateway {
    fn submit(&mut self, intent: &OrderIntent) -> GatewayResult<()> {
        match intent.action {
            IntentAction::Place => {
                if !intent.validate() {
                    return Err(GatewayError::Rejected {
                        order_id: intent.order_id,
                        reason: "invalid price or volume".to_string(),
                    });
                }
                if self.order(intent.order_id).is_some() {
                    return Err(GatewayError::Rejected {
                        order_id: intent.order_id,
                        reason: "duplicate order id".to_string(),
                    });
                }
                self.resting.push(intent.clone());
            }
            IntentAction::Replace => {
                if !intent.validate() {
                    return Err(GatewayError::Rejected {
                        order_id: intent.order_id,
                        reason: "invalid price or volume".to_string(),
                    });
                }
                let Some(order) = self
                    .resting
                    .iter_mut()
                    .find(|o| o.order_id == intent.order_id)
                else {
                    return Err(GatewayError::Unknown(intent.order_id));
                };
                order.price = intent.price;
                order.volume = intent.volume;
            }
            IntentAction::Cancel => {
                // Already filled or never seen: nothing to do
                self.resting.retain(|o| o.order_id != intent.order_id);
            }
        }
        debug!(
            "[PAPER] {:?} {} ({} resting)",
            intent.action,
            intent.order_id,
            self.resting.len()
        );
        Ok(())
    }

    fn poll_fills(&mut self, tick: &Tick) -> Vec<FillEvent> {
        let mut fills = Vec::new();
        let next_fill = &mut self.next_fill;
        self.resting.retain(|order| {
            let Some(price) = Self::execution_price(order, tick) else {
                return true;
            };
            *next_fill += 1;
            info!(
                "[PAPER] Filled {} {} x {} @ {} ({:?})",
                order.side, order.order_id, order.volume, price, order.purpose
            );
            fills.push(
                FillEvent::new(
                    format!("paper-{}", next_fill),
                    order.side,
                    price,
                    order.volume,
                    tick.timestamp,
                )
                .with_order(order.order_id),
            );
            false
        });
        fills
    }

    fn name(&self) -> &str {
        "PaperGateway"
    }
}
