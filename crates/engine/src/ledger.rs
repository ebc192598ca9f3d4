//! Basket Ledger
//!
//! Owns the filled legs of one instrument, one basket per side. Every
//! mutation recomputes the basket from its legs, so at all times:
//!
//! - `net_volume == Σ leg.volume`
//! - `avg_price == Σ(leg.fill_price * leg.volume) / net_volume`
//!
//! A fill against a side that has an opposite basket offsets that basket
//! first (oldest leg first); only the leftover opens a new leg. Fills are
//! deduplicated by `fill_id` because the execution layer may deliver the
//! same notification more than once.

use crate::error::{Error, Result};
use basket_core::{FillEvent, FillId, LegId, Price, Side, Timestamp, Volume};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One filled entry contributing to a basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub id: LegId,
    pub side: Side,
    pub fill_price: Price,
    pub volume: Volume,
    pub opened_at: Timestamp,
    pub tp_price: Option<Price>,
    pub sl_price: Option<Price>,
}

impl Leg {
    /// Unrealized PnL if the leg were exited at `mark`
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        self.side.pnl_per_unit(self.fill_price, mark) * self.volume
    }
}

/// Same-side legs tracked as one net position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    side: Side,
    /// Sorted oldest first by (opened_at, id)
    legs: Vec<Leg>,
    net_volume: Volume,
    avg_price: Price,
}

impl Basket {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            legs: Vec::new(),
            net_volume: Decimal::ZERO,
            avg_price: Decimal::ZERO,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn net_volume(&self) -> Volume {
        self.net_volume
    }

    pub fn avg_price(&self) -> Price {
        self.avg_price
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn leg(&self, leg_id: LegId) -> Option<&Leg> {
        self.legs.iter().find(|l| l.id == leg_id)
    }

    /// Unrealized PnL of the whole basket at `mark`
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        self.legs.iter().map(|l| l.unrealized_pnl(mark)).sum()
    }

    fn recompute(&mut self) {
        self.net_volume = self.legs.iter().map(|l| l.volume).sum();
        self.avg_price = if self.net_volume.is_zero() {
            Decimal::ZERO
        } else {
            let notional: Decimal = self.legs.iter().map(|l| l.fill_price * l.volume).sum();
            notional / self.net_volume
        };
    }

    fn insert(&mut self, leg: Leg) {
        let pos = self
            .legs
            .partition_point(|l| (l.opened_at, l.id) <= (leg.opened_at, leg.id));
        self.legs.insert(pos, leg);
        self.recompute();
    }

    /// Reduce one leg by up to `volume` at `exit_price`
    fn reduce_leg(&mut self, index: usize, volume: Volume, exit_price: Price) -> LegReduction {
        let leg = &mut self.legs[index];
        let taken = volume.min(leg.volume);
        let reduction = LegReduction {
            leg_id: leg.id,
            side: leg.side,
            volume: taken,
            entry_price: leg.fill_price,
            exit_price,
            realized_pnl: leg.side.pnl_per_unit(leg.fill_price, exit_price) * taken,
            closed: taken == leg.volume,
        };
        leg.volume -= taken;
        if reduction.closed {
            self.legs.remove(index);
        }
        reduction
    }

    /// Offset `volume` against legs oldest-first; returns reductions and leftover
    fn reduce_oldest_first(
        &mut self,
        mut volume: Volume,
        exit_price: Price,
    ) -> (Vec<LegReduction>, Volume) {
        let mut reductions = Vec::new();
        while volume > Decimal::ZERO && !self.legs.is_empty() {
            let reduction = self.reduce_leg(0, volume, exit_price);
            volume -= reduction.volume;
            reductions.push(reduction);
        }
        self.recompute();
        (reductions, volume)
    }

    fn remove_legs(&mut self, leg_ids: &[LegId]) -> Vec<Leg> {
        let (removed, kept): (Vec<Leg>, Vec<Leg>) = std::mem::take(&mut self.legs)
            .into_iter()
            .partition(|l| leg_ids.contains(&l.id));
        self.legs = kept;
        self.recompute();
        removed
    }
}

/// Volume taken out of one leg by an opposing fill or a close
#[derive(Debug, Clone, PartialEq)]
pub struct LegReduction {
    pub leg_id: LegId,
    pub side: Side,
    pub volume: Volume,
    pub entry_price: Price,
    pub exit_price: Price,
    pub realized_pnl: Decimal,
    /// The leg is gone from the ledger
    pub closed: bool,
}

/// What a fill did to the ledger
#[derive(Debug, Clone, Default)]
pub struct FillOutcome {
    /// Opposite-side legs reduced, oldest first
    pub reductions: Vec<LegReduction>,
    /// Leg opened from the leftover volume
    pub opened: Option<Leg>,
}

impl FillOutcome {
    pub fn realized_volume(&self) -> Volume {
        self.reductions.iter().map(|r| r.volume).sum()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.reductions.iter().map(|r| r.realized_pnl).sum()
    }

    /// Side whose basket was reduced, if any
    pub fn reduced_side(&self) -> Option<Side> {
        self.reductions.first().map(|r| r.side)
    }
}

/// Filled-leg bookkeeping for one instrument
#[derive(Debug)]
pub struct BasketLedger {
    long: Basket,
    short: Basket,
    seen_fills: HashSet<FillId>,
    next_leg_id: LegId,
}

impl Default for BasketLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BasketLedger {
    pub fn new() -> Self {
        Self {
            long: Basket::new(Side::Buy),
            short: Basket::new(Side::Sell),
            seen_fills: HashSet::new(),
            next_leg_id: 1,
        }
    }

    pub fn basket(&self, side: Side) -> &Basket {
        match side {
            Side::Buy => &self.long,
            Side::Sell => &self.short,
        }
    }

    fn basket_mut(&mut self, side: Side) -> &mut Basket {
        match side {
            Side::Buy => &mut self.long,
            Side::Sell => &mut self.short,
        }
    }

    /// No legs on either side
    pub fn is_flat(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    /// Legs of both baskets
    pub fn all_legs(&self) -> impl Iterator<Item = &Leg> {
        self.long.legs.iter().chain(self.short.legs.iter())
    }

    /// Entry prices of the legs on `side`
    pub fn leg_prices(&self, side: Side) -> Vec<Price> {
        self.basket(side).legs.iter().map(|l| l.fill_price).collect()
    }

    /// Signed net position (long minus short)
    pub fn net_position(&self) -> Volume {
        self.long.net_volume - self.short.net_volume
    }

    pub fn has_seen(&self, fill_id: &FillId) -> bool {
        self.seen_fills.contains(fill_id)
    }

    fn admit(&mut self, fill: &FillEvent) -> Result<()> {
        if self.seen_fills.contains(&fill.fill_id) {
            debug!("[LEDGER] Duplicate fill {} ignored", fill.fill_id);
            return Err(Error::DuplicateFill(fill.fill_id.clone()));
        }
        if fill.volume <= Decimal::ZERO {
            warn!(
                "[LEDGER] Fill {} has non-positive volume {}, ignored",
                fill.fill_id, fill.volume
            );
            return Err(Error::Sizing {
                computed: fill.volume,
                minimum: Decimal::ZERO,
            });
        }
        if fill.price <= Decimal::ZERO {
            warn!(
                "[LEDGER] Fill {} has non-positive price {}, ignored",
                fill.fill_id, fill.price
            );
            return Err(Error::InvalidFill(format!(
                "fill {} price {}",
                fill.fill_id, fill.price
            )));
        }
        self.seen_fills.insert(fill.fill_id.clone());
        Ok(())
    }

    /// Apply an entry or exit fill
    ///
    /// 1. Offset the opposite basket oldest-first.
    /// 2. Open a leg on `fill.side` with any leftover volume.
    pub fn apply_fill(&mut self, fill: &FillEvent) -> Result<FillOutcome> {
        self.admit(fill)?;
        Ok(self.offset_then_open(fill, fill.volume))
    }

    /// Apply the fill of a close intent aimed at one specific leg
    ///
    /// The target leg is reduced first; volume beyond it (or all of it, if
    /// the leg is already gone) follows the normal offset-then-open path so
    /// the ledger keeps matching the account.
    pub fn apply_close_fill(&mut self, fill: &FillEvent, leg_id: LegId) -> Result<FillOutcome> {
        self.admit(fill)?;
        let leg_side = fill.side.opposite();
        let mut remaining = fill.volume;
        let mut reductions = Vec::new();

        if let Some(leg) = self.basket(leg_side).leg(leg_id).cloned() {
            if remaining >= leg.volume {
                let closed = self.close_legs(leg_side, &[leg_id]);
                remaining -= closed;
                reductions.push(LegReduction {
                    leg_id,
                    side: leg_side,
                    volume: closed,
                    entry_price: leg.fill_price,
                    exit_price: fill.price,
                    realized_pnl: leg_side.pnl_per_unit(leg.fill_price, fill.price) * closed,
                    closed: true,
                });
            } else {
                let basket = self.basket_mut(leg_side);
                if let Some(index) = basket.legs.iter().position(|l| l.id == leg_id) {
                    reductions.push(basket.reduce_leg(index, remaining, fill.price));
                    basket.recompute();
                }
                remaining = Decimal::ZERO;
            }
        } else {
            debug!(
                "[LEDGER] Close fill {} for leg {} which is already closed",
                fill.fill_id, leg_id
            );
        }

        let mut outcome = if remaining > Decimal::ZERO {
            self.offset_then_open(fill, remaining)
        } else {
            FillOutcome::default()
        };
        reductions.append(&mut outcome.reductions);
        outcome.reductions = reductions;
        Ok(outcome)
    }

    fn offset_then_open(&mut self, fill: &FillEvent, volume: Volume) -> FillOutcome {
        let (reductions, leftover) = self
            .basket_mut(fill.side.opposite())
            .reduce_oldest_first(volume, fill.price);

        let opened = if leftover > Decimal::ZERO {
            let leg = Leg {
                id: self.next_leg_id,
                side: fill.side,
                fill_price: fill.price,
                volume: leftover,
                opened_at: fill.timestamp,
                tp_price: None,
                sl_price: None,
            };
            self.next_leg_id += 1;
            self.basket_mut(fill.side).insert(leg.clone());
            debug!(
                "[LEDGER] Leg {} opened: {} {} @ {}",
                leg.id, leg.side, leg.volume, leg.fill_price
            );
            Some(leg)
        } else {
            None
        };

        FillOutcome { reductions, opened }
    }

    /// Remove the given legs; unknown ids are already closed and ignored
    ///
    /// Returns the volume removed.
    pub fn close_legs(&mut self, side: Side, leg_ids: &[LegId]) -> Volume {
        let removed = self.basket_mut(side).remove_legs(leg_ids);
        let volume: Volume = removed.iter().map(|l| l.volume).sum();
        if removed.len() < leg_ids.len() {
            debug!(
                "[LEDGER] {} of {} {} legs were already closed",
                leg_ids.len() - removed.len(),
                leg_ids.len(),
                side
            );
        }
        volume
    }

    /// Record the basket's current protective prices on each of its legs
    pub fn stamp_protection(&mut self, side: Side, tp: Option<Price>, sl: Option<Price>) {
        for leg in &mut self.basket_mut(side).legs {
            leg.tp_price = tp;
            leg.sl_price = sl;
        }
    }

    /// Drop all legs and the dedupe history
    pub fn reset(&mut self) {
        self.long = Basket::new(Side::Buy);
        self.short = Basket::new(Side::Sell);
        self.seen_fills.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn fill(id: &str, side: Side, price: Decimal, volume: Decimal, secs: i64) -> FillEvent {
        FillEvent::new(id, side, price, volume, at(secs))
    }

    fn assert_invariants(ledger: &BasketLedger) {
        for side in [Side::Buy, Side::Sell] {
            let basket = ledger.basket(side);
            let sum: Decimal = basket.legs().iter().map(|l| l.volume).sum();
            assert_eq!(basket.net_volume(), sum);
            assert!(basket.legs().iter().all(|l| l.side == side));
        }
    }

    #[test]
    fn test_weighted_average_of_three_legs() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("f1", Side::Buy, dec!(1.1000), dec!(0.1), 0)).unwrap();
        ledger.apply_fill(&fill("f2", Side::Buy, dec!(1.1010), dec!(0.1), 1)).unwrap();
        ledger.apply_fill(&fill("f3", Side::Buy, dec!(1.1020), dec!(0.1), 2)).unwrap();

        let long = ledger.basket(Side::Buy);
        assert_eq!(long.net_volume(), dec!(0.3));
        assert_eq!(long.avg_price(), dec!(1.1010));
        assert_eq!(long.legs().len(), 3);
        assert_invariants(&ledger);
    }

    #[test]
    fn test_duplicate_fill_applied_once() {
        let mut ledger = BasketLedger::new();
        let f = fill("dup", Side::Sell, dec!(100), dec!(1), 0);
        ledger.apply_fill(&f).unwrap();
        let again = ledger.apply_fill(&f);

        assert!(matches!(again, Err(Error::DuplicateFill(_))));
        assert_eq!(ledger.basket(Side::Sell).net_volume(), dec!(1));
        assert_eq!(ledger.basket(Side::Sell).legs().len(), 1);
    }

    #[test]
    fn test_non_positive_volume_is_noop() {
        let mut ledger = BasketLedger::new();
        let result = ledger.apply_fill(&fill("zero", Side::Buy, dec!(100), dec!(0), 0));
        assert!(matches!(result, Err(Error::Sizing { .. })));
        assert!(ledger.is_flat());
        // Not remembered: a corrected notification with the same id still applies
        assert!(!ledger.has_seen(&FillId::new("zero")));
    }

    #[test]
    fn test_opposite_fill_offsets_oldest_first() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("b1", Side::Buy, dec!(100), dec!(1), 0)).unwrap();
        ledger.apply_fill(&fill("b2", Side::Buy, dec!(110), dec!(1), 1)).unwrap();

        // Sell 1.5 @ 120: closes leg @100 fully, half of leg @110
        let outcome = ledger
            .apply_fill(&fill("s1", Side::Sell, dec!(120), dec!(1.5), 2))
            .unwrap();

        assert_eq!(outcome.reductions.len(), 2);
        assert!(outcome.reductions[0].closed);
        assert_eq!(outcome.reductions[0].entry_price, dec!(100));
        assert!(!outcome.reductions[1].closed);
        assert_eq!(outcome.realized_volume(), dec!(1.5));
        assert_eq!(outcome.realized_pnl(), dec!(25)); // 20 + 0.5 * 10
        assert!(outcome.opened.is_none());

        let long = ledger.basket(Side::Buy);
        assert_eq!(long.net_volume(), dec!(0.5));
        assert_eq!(long.avg_price(), dec!(110));
        assert!(ledger.basket(Side::Sell).is_empty());
        assert_invariants(&ledger);
    }

    #[test]
    fn test_leftover_opens_opposite_leg() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("b1", Side::Buy, dec!(100), dec!(1), 0)).unwrap();
        let outcome = ledger
            .apply_fill(&fill("s1", Side::Sell, dec!(95), dec!(3), 1))
            .unwrap();

        assert_eq!(outcome.realized_pnl(), dec!(-5));
        let opened = outcome.opened.unwrap();
        assert_eq!(opened.side, Side::Sell);
        assert_eq!(opened.volume, dec!(2));
        assert!(ledger.basket(Side::Buy).is_empty());
        assert_eq!(ledger.net_position(), dec!(-2));
        assert_invariants(&ledger);
    }

    #[test]
    fn test_arrival_order_does_not_change_average() {
        let fills = [
            fill("a", Side::Buy, dec!(1.1003), dec!(0.3), 0),
            fill("b", Side::Buy, dec!(1.0987), dec!(0.7), 1),
            fill("c", Side::Buy, dec!(1.1011), dec!(0.2), 2),
        ];

        let mut forward = BasketLedger::new();
        for f in &fills {
            forward.apply_fill(f).unwrap();
        }
        let mut backward = BasketLedger::new();
        for f in fills.iter().rev() {
            backward.apply_fill(f).unwrap();
        }

        let diff = forward.basket(Side::Buy).avg_price() - backward.basket(Side::Buy).avg_price();
        assert!(diff.abs() < dec!(0.0000001));
        // Legs are kept oldest first regardless of arrival order
        let ids: Vec<Timestamp> = backward
            .basket(Side::Buy)
            .legs()
            .iter()
            .map(|l| l.opened_at)
            .collect();
        assert_eq!(ids, vec![at(0), at(1), at(2)]);
    }

    #[test]
    fn test_close_legs_ignores_unknown_ids() {
        let mut ledger = BasketLedger::new();
        let l1 = ledger
            .apply_fill(&fill("b1", Side::Buy, dec!(100), dec!(1), 0))
            .unwrap()
            .opened
            .unwrap();
        ledger.apply_fill(&fill("b2", Side::Buy, dec!(90), dec!(2), 1)).unwrap();

        let closed = ledger.close_legs(Side::Buy, &[l1.id, 999]);
        assert_eq!(closed, dec!(1));
        assert_eq!(ledger.basket(Side::Buy).avg_price(), dec!(90));
        assert_eq!(ledger.close_legs(Side::Buy, &[l1.id]), dec!(0));
        assert_invariants(&ledger);
    }

    #[test]
    fn test_close_fill_targets_specific_leg() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("b1", Side::Buy, dec!(100), dec!(1), 0)).unwrap();
        let newest = ledger
            .apply_fill(&fill("b2", Side::Buy, dec!(120), dec!(1), 1))
            .unwrap()
            .opened
            .unwrap();

        let outcome = ledger
            .apply_close_fill(&fill("c1", Side::Sell, dec!(110), dec!(1), 2), newest.id)
            .unwrap();

        assert_eq!(outcome.reductions.len(), 1);
        assert_eq!(outcome.reductions[0].leg_id, newest.id);
        assert_eq!(outcome.realized_pnl(), dec!(-10));
        // The older leg survives
        assert_eq!(ledger.basket(Side::Buy).avg_price(), dec!(100));
    }

    #[test]
    fn test_close_fill_for_closed_leg_falls_back_to_offset() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("b1", Side::Buy, dec!(100), dec!(1), 0)).unwrap();
        let outcome = ledger
            .apply_close_fill(&fill("c1", Side::Sell, dec!(105), dec!(1), 1), 42)
            .unwrap();

        assert_eq!(outcome.realized_volume(), dec!(1));
        assert!(ledger.is_flat());
    }

    #[test]
    fn test_stamp_protection_sets_every_leg() {
        let mut ledger = BasketLedger::new();
        ledger.apply_fill(&fill("s1", Side::Sell, dec!(50), dec!(1), 0)).unwrap();
        ledger.apply_fill(&fill("s2", Side::Sell, dec!(52), dec!(1), 1)).unwrap();
        ledger.stamp_protection(Side::Sell, Some(dec!(49)), Some(dec!(54)));

        assert!(ledger
            .basket(Side::Sell)
            .legs()
            .iter()
            .all(|l| l.tp_price == Some(dec!(49)) && l.sl_price == Some(dec!(54))));
    }
}
