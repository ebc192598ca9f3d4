//! Protective Order Manager
//!
//! Keeps one stop-loss and one or more take-profit orders per non-empty
//! basket, sized to the basket's net volume and priced from its average.
//!
//! ```text
//!   Basket (avg, net) ──refresh──► plan ──diff──► Place / Replace / Cancel
//!   market price ──────trail────► stop (favorable moves only)
//! ```
//!
//! When the basket composition changes the stop is re-anchored to the new
//! average. Otherwise a stop only ever moves toward profit, and only by more
//! than the trailing `min_step`.

use crate::config::{TakeProfitTier, TrailingConfig};
use crate::ledger::Basket;
use basket_core::{
    Instrument, InstrumentSpec, IntentPurpose, OrderId, OrderIntent, OrderType, Price, Side,
    Volume,
};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A live protective order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveOrder {
    pub order_id: OrderId,
    /// Order side, opposite to the basket it protects
    pub side: Side,
    pub order_type: OrderType,
    pub price: Price,
    pub volume: Volume,
    pub purpose: IntentPurpose,
}

impl ProtectiveOrder {
    fn from_intent(intent: &OrderIntent, price: Price) -> Self {
        Self {
            order_id: intent.order_id,
            side: intent.side,
            order_type: intent.order_type,
            price,
            volume: intent.volume,
            purpose: intent.purpose,
        }
    }

    fn cancel_intent(&self) -> OrderIntent {
        OrderIntent::cancel(self.order_id, self.side, self.order_type, self.purpose)
    }

    fn replace_intent(&self) -> OrderIntent {
        OrderIntent::replace(
            self.order_id,
            self.side,
            self.order_type,
            self.price,
            self.volume,
            self.purpose,
        )
    }
}

#[derive(Debug, Clone, Default)]
struct SideProtection {
    stop: Option<ProtectiveOrder>,
    targets: Vec<ProtectiveOrder>,
    /// (net_volume, avg_price) the orders were last sized for
    anchor: Option<(Volume, Price)>,
    filled_tiers: Vec<usize>,
    exiting: bool,
}

pub struct ProtectiveOrderManager {
    instrument: Instrument,
    trailing: Option<TrailingConfig>,
    long: SideProtection,
    short: SideProtection,
}

impl ProtectiveOrderManager {
    pub fn new(instrument: Instrument, trailing: Option<TrailingConfig>) -> Self {
        Self {
            instrument,
            trailing,
            long: SideProtection::default(),
            short: SideProtection::default(),
        }
    }

    fn state(&self, side: Side) -> &SideProtection {
        match side {
            Side::Buy => &self.long,
            Side::Sell => &self.short,
        }
    }

    fn state_mut(&mut self, side: Side) -> &mut SideProtection {
        match side {
            Side::Buy => &mut self.long,
            Side::Sell => &mut self.short,
        }
    }

    fn min_step(&self) -> Price {
        self.trailing.map(|t| t.min_step).unwrap_or(Decimal::ZERO)
    }

    /// Stop protecting the basket on `side`
    pub fn stop(&self, side: Side) -> Option<&ProtectiveOrder> {
        self.state(side).stop.as_ref()
    }

    /// Take-profit orders protecting the basket on `side`, nearest tier first
    pub fn targets(&self, side: Side) -> &[ProtectiveOrder] {
        &self.state(side).targets
    }

    pub fn stop_price(&self, side: Side) -> Option<Price> {
        self.stop(side).map(|o| o.price)
    }

    pub fn first_target_price(&self, side: Side) -> Option<Price> {
        self.targets(side).first().map(|o| o.price)
    }

    /// A protective order on `side` has (partially) executed
    pub fn exit_in_progress(&self, side: Side) -> bool {
        self.state(side).exiting
    }

    /// Basket side protected by `order_id`, if it is one of ours
    pub fn owner(&self, order_id: OrderId) -> Option<Side> {
        [Side::Buy, Side::Sell].into_iter().find(|side| {
            let state = self.state(*side);
            state.stop.as_ref().is_some_and(|o| o.order_id == order_id)
                || state.targets.iter().any(|o| o.order_id == order_id)
        })
    }

    /// Bring the orders of `basket` in line with its current composition
    pub fn refresh(
        &mut self,
        basket: &Basket,
        tp_distance: Price,
        sl_distance: Price,
        tiers: Option<&[TakeProfitTier]>,
    ) -> Vec<OrderIntent> {
        let side = basket.side();
        if basket.is_empty() {
            return self.cancel_side(side);
        }

        let composition = (basket.net_volume(), basket.avg_price());
        let changed = self.state(side).anchor != Some(composition);
        let plan = self.target_plan(basket, tp_distance, tiers);

        let mut intents = Vec::new();
        if let Some(intent) = self.refresh_stop(basket, sl_distance, changed) {
            intents.push(intent);
        }
        intents.extend(self.apply_targets(side, plan));
        self.state_mut(side).anchor = Some(composition);

        if !intents.is_empty() {
            info!(
                "[PROTECT] {} basket {} @ {}: SL {:?}, {} TP orders, {} intents",
                side,
                composition.0,
                composition.1,
                self.stop_price(side),
                self.targets(side).len(),
                intents.len()
            );
        }
        intents
    }

    fn refresh_stop(
        &mut self,
        basket: &Basket,
        sl_distance: Price,
        changed: bool,
    ) -> Option<OrderIntent> {
        let side = basket.side();
        let volume = basket.net_volume();
        let candidate = (sl_distance > Decimal::ZERO).then(|| {
            self.instrument
                .round_price(side.toward_loss(basket.avg_price(), sl_distance))
        });

        let min_step = self.min_step();
        let state = self.state_mut(side);
        let Some(stop) = state.stop.as_mut() else {
            let price = candidate?;
            let intent = OrderIntent::place(
                side.opposite(),
                OrderType::Stop,
                Some(price),
                volume,
                IntentPurpose::StopLoss,
            );
            state.stop = Some(ProtectiveOrder::from_intent(&intent, price));
            return Some(intent);
        };

        if changed {
            let price = candidate.unwrap_or(stop.price);
            if stop.price == price && stop.volume == volume {
                return None;
            }
            stop.price = price;
            stop.volume = volume;
            return Some(stop.replace_intent());
        }

        let price = candidate?;
        if side.pnl_per_unit(stop.price, price) > min_step {
            stop.price = price;
            Some(stop.replace_intent())
        } else {
            None
        }
    }

    /// (tier, price, volume) for every take-profit the basket should carry
    fn target_plan(
        &self,
        basket: &Basket,
        tp_distance: Price,
        tiers: Option<&[TakeProfitTier]>,
    ) -> Vec<(usize, Price, Volume)> {
        if tp_distance <= Decimal::ZERO {
            return Vec::new();
        }
        let side = basket.side();
        let avg = basket.avg_price();
        let net = basket.net_volume();
        let price_at = |multiplier: Decimal| {
            self.instrument
                .round_price(side.toward_profit(avg, tp_distance * multiplier))
        };

        let Some(tiers) = tiers else {
            return vec![(0, price_at(Decimal::ONE), net)];
        };

        let filled = &self.state(side).filled_tiers;
        let consumed: Decimal = filled
            .iter()
            .filter_map(|i| tiers.get(*i))
            .map(|t| t.exit_percent)
            .sum();
        let scale = Decimal::ONE - consumed;
        if scale <= Decimal::ZERO {
            return Vec::new();
        }
        let absorbs_remainder = tiers.iter().map(|t| t.exit_percent).sum::<Decimal>() >= Decimal::ONE;

        let remaining: Vec<(usize, &TakeProfitTier)> = tiers
            .iter()
            .enumerate()
            .filter(|(i, _)| !filled.contains(i))
            .collect();

        let mut allocated = Decimal::ZERO;
        let mut plan = Vec::new();
        for (pos, (tier, config)) in remaining.iter().enumerate() {
            let available = net - allocated;
            let last = pos + 1 == remaining.len();
            let volume = if last && absorbs_remainder {
                available
            } else {
                self.instrument
                    .round_volume_down(net * config.exit_percent / scale)
                    .min(available)
            };
            if !self.instrument.is_tradable(volume) {
                debug!("[PROTECT] {} tier {} volume {} not tradable", side, tier, volume);
                continue;
            }
            allocated += volume;
            plan.push((*tier, price_at(config.distance_multiplier), volume));
        }
        plan
    }

    fn apply_targets(&mut self, side: Side, plan: Vec<(usize, Price, Volume)>) -> Vec<OrderIntent> {
        let state = self.state_mut(side);
        let mut previous = std::mem::take(&mut state.targets);
        let mut intents = Vec::new();

        for (tier, price, volume) in plan {
            let purpose = IntentPurpose::TakeProfit { tier };
            match previous.iter().position(|o| o.purpose == purpose) {
                Some(i) => {
                    let mut order = previous.remove(i);
                    if order.price != price || order.volume != volume {
                        order.price = price;
                        order.volume = volume;
                        intents.push(order.replace_intent());
                    }
                    state.targets.push(order);
                }
                None => {
                    let intent = OrderIntent::place(
                        side.opposite(),
                        OrderType::Limit,
                        Some(price),
                        volume,
                        purpose,
                    );
                    state.targets.push(ProtectiveOrder::from_intent(&intent, price));
                    intents.push(intent);
                }
            }
        }

        intents.extend(previous.iter().map(ProtectiveOrder::cancel_intent));
        intents
    }

    /// Trail the stop behind `market` (the price the basket would exit at)
    ///
    /// Without an existing stop one is placed once the trailed price locks
    /// in profit over the basket average.
    pub fn trail(&mut self, basket: &Basket, market: Price) -> Option<OrderIntent> {
        let trailing = self.trailing?;
        if basket.is_empty() {
            return None;
        }
        let side = basket.side();
        let candidate = self
            .instrument
            .round_price(side.toward_loss(market, trailing.distance));
        let volume = basket.net_volume();
        let avg = basket.avg_price();

        let state = self.state_mut(side);
        let Some(stop) = state.stop.as_mut() else {
            if side.pnl_per_unit(avg, candidate) <= Decimal::ZERO {
                return None;
            }
            let intent = OrderIntent::place(
                side.opposite(),
                OrderType::Stop,
                Some(candidate),
                volume,
                IntentPurpose::StopLoss,
            );
            state.stop = Some(ProtectiveOrder::from_intent(&intent, candidate));
            debug!("[PROTECT] {} trailing stop armed @ {}", side, candidate);
            return Some(intent);
        };

        if side.pnl_per_unit(stop.price, candidate) <= trailing.min_step {
            return None;
        }
        debug!("[PROTECT] {} stop trailed {} -> {}", side, stop.price, candidate);
        stop.price = candidate;
        stop.volume = volume;
        Some(stop.replace_intent())
    }

    /// Record an execution of one of our orders
    ///
    /// Returns the protected basket side and the order's purpose.
    pub fn on_filled(&mut self, order_id: OrderId, volume: Volume) -> Option<(Side, IntentPurpose)> {
        let side = self.owner(order_id)?;
        let state = self.state_mut(side);
        state.exiting = true;

        if let Some(stop) = state.stop.as_mut().filter(|o| o.order_id == order_id) {
            stop.volume -= volume;
            if stop.volume <= Decimal::ZERO {
                state.stop = None;
            }
            return Some((side, IntentPurpose::StopLoss));
        }

        let i = state.targets.iter().position(|o| o.order_id == order_id)?;
        let purpose = state.targets[i].purpose;
        state.targets[i].volume -= volume;
        if state.targets[i].volume <= Decimal::ZERO {
            state.targets.remove(i);
            if let IntentPurpose::TakeProfit { tier } = purpose {
                state.filled_tiers.push(tier);
            }
        }
        Some((side, purpose))
    }

    /// Stop tracking an order the gateway no longer holds
    pub fn forget(&mut self, order_id: OrderId) -> bool {
        let Some(side) = self.owner(order_id) else {
            return false;
        };
        let state = self.state_mut(side);
        if state.stop.as_ref().is_some_and(|o| o.order_id == order_id) {
            state.stop = None;
        }
        state.targets.retain(|o| o.order_id != order_id);
        true
    }

    /// Cancel every protective order of the basket on `side`
    pub fn cancel_side(&mut self, side: Side) -> Vec<OrderIntent> {
        let state = std::mem::take(self.state_mut(side));
        let intents: Vec<OrderIntent> = state
            .stop
            .iter()
            .chain(state.targets.iter())
            .map(ProtectiveOrder::cancel_intent)
            .collect();
        if !intents.is_empty() {
            debug!("[PROTECT] {} protective orders cancelled on {}", intents.len(), side);
        }
        intents
    }

    pub fn cancel_all(&mut self) -> Vec<OrderIntent> {
        let mut intents = self.cancel_side(Side::Buy);
        intents.extend(self.cancel_side(Side::Sell));
        intents
    }
}
