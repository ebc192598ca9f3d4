//! Grid Controller
//!
//! Lays pending entry orders on a ladder spaced by `step` around a reference
//! price, keeps the ladder centred as price travels, and expires stale
//! levels. The controller owns every pending grid level; it only emits
//! place/cancel intents and never talks to the gateway itself.

use crate::config::{GridConfig, GridEntry, GridMode};
use crate::error::Result;
use basket_core::{
    EntrySignal, Instrument, InstrumentSpec, IntentPurpose, OrderId, OrderIntent, Price, Side,
    Timestamp, Volume,
};
use chrono::Duration;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One pending grid entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub order_id: OrderId,
    /// Signed step offset from the reference at placement time
    pub index: i32,
    pub side: Side,
    pub target_price: Price,
    pub volume: Volume,
    pub expires_at: Option<Timestamp>,
}

/// Parameters of one grid (re)build
#[derive(Debug, Clone)]
pub struct GridRequest<'a> {
    pub reference: Price,
    pub step: Price,
    pub levels_per_side: u32,
    /// Sides the signal source currently permits
    pub allowed: EntrySignal,
    /// Entry prices of already-filled legs
    pub filled: &'a [(Side, Price)],
    pub now: Timestamp,
}

pub struct GridController {
    instrument: Instrument,
    mode: GridMode,
    entry: GridEntry,
    expiration: Option<Duration>,
    step: Price,
    levels_per_side: u32,
    reference: Option<Price>,
    levels: Vec<GridLevel>,
    /// Levels the venue refused; not re-placed until the reference moves
    rejected: Vec<(Side, Price)>,
}

impl GridController {
    pub fn new(config: &GridConfig, instrument: Instrument) -> Self {
        Self {
            instrument,
            mode: config.mode,
            entry: config.entry,
            expiration: config.pending_expiration(),
            step: config.step,
            levels_per_side: config.levels_per_side,
            reference: None,
            levels: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn reference(&self) -> Option<Price> {
        self.reference
    }

    pub fn step(&self) -> Price {
        self.step
    }

    pub fn pending(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.levels.iter().any(|l| l.order_id == order_id)
    }

    /// Forget the reference so the next signal rebuilds from scratch
    pub fn clear_reference(&mut self) {
        self.rejected.clear();
        if self.reference.take().is_some() {
            debug!("[GRID] Reference cleared");
        }
    }

    fn occupied(&self, side: Side, price: Price, filled: &[(Side, Price)]) -> bool {
        let half_step = self.step / Decimal::TWO;
        let near = |other: Price| (other - price).abs() < half_step;
        self.levels
            .iter()
            .any(|l| l.side == side && near(l.target_price))
            || filled.iter().any(|(s, p)| *s == side && near(*p))
    }

    /// Place up to `2 * levels_per_side` levels around `request.reference`
    ///
    /// Levels closer than `step / 2` to a pending or filled price on the same
    /// side are skipped. `volume_for` sizes each level, nearest level first
    /// per side; a sizing error skips the level.
    pub fn build_grid(
        &mut self,
        request: GridRequest<'_>,
        mut volume_for: impl FnMut(Side) -> Result<Volume>,
    ) -> Vec<OrderIntent> {
        if self.reference != Some(request.reference) {
            self.rejected.clear();
        }
        self.reference = Some(request.reference);
        self.step = request.step;
        self.levels_per_side = request.levels_per_side;

        let order_type = self.entry.order_type();
        let expires_at = self.expiration.map(|d| request.now + d);
        let mut intents = Vec::new();

        for side in [Side::Buy, Side::Sell] {
            if !self.mode.includes(side) || !request.allowed.allows(side) {
                continue;
            }
            let direction = self.entry.direction(side);

            for i in 1..=request.levels_per_side {
                let offset = direction * Decimal::from(i);
                let index = if direction.is_sign_negative() {
                    -(i as i32)
                } else {
                    i as i32
                };
                let price = self
                    .instrument
                    .round_price(request.reference + offset * request.step);
                if price <= Decimal::ZERO {
                    continue;
                }
                if self.occupied(side, price, request.filled) {
                    debug!("[GRID] {} level {} @ {} already occupied", side, index, price);
                    continue;
                }
                if self.rejected.contains(&(side, price)) {
                    debug!("[GRID] {} level {} @ {} was rejected, skipped", side, index, price);
                    continue;
                }
                let volume = match volume_for(side) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("[GRID] {} level {} @ {} skipped: {}", side, index, price, e);
                        continue;
                    }
                };

                let intent = OrderIntent::place(
                    side,
                    order_type,
                    Some(price),
                    volume,
                    IntentPurpose::GridEntry { level: index },
                );
                self.levels.push(GridLevel {
                    order_id: intent.order_id,
                    index,
                    side,
                    target_price: price,
                    volume,
                    expires_at,
                });
                intents.push(intent);
            }
        }

        info!(
            "[GRID] Grid built around {} (step {}): {} new levels, {} pending",
            request.reference,
            request.step,
            intents.len(),
            self.levels.len()
        );
        intents
    }

    /// Shift the reference by whole steps once price has moved a full step
    ///
    /// Returns `None` when no shift happened, otherwise cancels for levels
    /// that no longer belong to the ladder around the new reference.
    pub fn recenter(&mut self, price: Price) -> Option<Vec<OrderIntent>> {
        let reference = self.reference?;
        if self.step <= Decimal::ZERO {
            return None;
        }
        let shift = ((price - reference) / self.step).trunc();
        if shift.is_zero() {
            return None;
        }
        let new_reference = reference + shift * self.step;
        self.reference = Some(new_reference);
        self.rejected.clear();
        info!(
            "[GRID] Recentered {} -> {} ({} steps)",
            reference, new_reference, shift
        );

        let half_step = self.step / Decimal::TWO;
        let reach = self.step * Decimal::from(self.levels_per_side) + half_step;
        let entry = self.entry;
        let (keep, drop): (Vec<GridLevel>, Vec<GridLevel>) =
            std::mem::take(&mut self.levels).into_iter().partition(|l| {
                let signed = (l.target_price - new_reference) * entry.direction(l.side);
                signed >= half_step && signed <= reach
            });
        self.levels = keep;
        Some(drop.iter().map(|l| self.cancel_intent(l)).collect())
    }

    /// Cancel levels whose expiration has passed
    ///
    /// When nothing is left pending and the instrument is flat, the
    /// reference is cleared so the next signal starts a fresh grid.
    pub fn expire_pending(&mut self, now: Timestamp, flat: bool) -> Vec<OrderIntent> {
        let (expired, live): (Vec<GridLevel>, Vec<GridLevel>) = std::mem::take(&mut self.levels)
            .into_iter()
            .partition(|l| l.expires_at.is_some_and(|t| t <= now));
        self.levels = live;

        if !expired.is_empty() {
            info!("[GRID] {} pending levels expired", expired.len());
        }
        let intents = expired.iter().map(|l| self.cancel_intent(l)).collect();

        if self.levels.is_empty() && flat {
            self.clear_reference();
        }
        intents
    }

    /// Book `volume` filled against a level's order
    ///
    /// The level stays pending with its remaining volume until fully
    /// filled; the returned level carries the remainder (zero once done).
    pub fn on_filled(&mut self, order_id: OrderId, volume: Volume) -> Option<GridLevel> {
        let pos = self.levels.iter().position(|l| l.order_id == order_id)?;
        let level = &mut self.levels[pos];
        level.volume -= volume;
        if level.volume > Decimal::ZERO {
            debug!(
                "[GRID] {} level {} partially filled, {} remaining",
                level.side, level.index, level.volume
            );
            return Some(level.clone());
        }
        let mut level = self.levels.remove(pos);
        level.volume = Decimal::ZERO;
        Some(level)
    }

    /// The venue refused a level's order; keep its price out of rebuilds
    /// around the same reference
    pub fn reject(&mut self, order_id: OrderId) -> Option<GridLevel> {
        let level = self.forget(order_id)?;
        self.rejected.push((level.side, level.target_price));
        Some(level)
    }

    /// Drop a level without emitting a cancel
    pub fn forget(&mut self, order_id: OrderId) -> Option<GridLevel> {
        let pos = self.levels.iter().position(|l| l.order_id == order_id)?;
        Some(self.levels.remove(pos))
    }

    /// Cancel one level; unknown or already-gone orders are a no-op
    pub fn cancel(&mut self, order_id: OrderId) -> Option<OrderIntent> {
        self.forget(order_id).map(|l| self.cancel_intent(&l))
    }

    /// Cancel every pending level on `side`
    pub fn cancel_side(&mut self, side: Side) -> Vec<OrderIntent> {
        let (cancelled, kept): (Vec<GridLevel>, Vec<GridLevel>) = std::mem::take(&mut self.levels)
            .into_iter()
            .partition(|l| l.side == side);
        self.levels = kept;
        cancelled.iter().map(|l| self.cancel_intent(l)).collect()
    }

    /// Cancel everything and forget the reference
    pub fn cancel_all(&mut self) -> Vec<OrderIntent> {
        let levels = std::mem::take(&mut self.levels);
        self.clear_reference();
        levels.iter().map(|l| self.cancel_intent(l)).collect()
    }

    fn cancel_intent(&self, level: &GridLevel) -> OrderIntent {
        OrderIntent::cancel(
            level.order_id,
            level.side,
            self.entry.order_type(),
            IntentPurpose::GridEntry { level: level.index },
        )
    }
}

/// Outcome of checking one price against the last accepted reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuardVerdict {
    Accepted,
    /// First price of a feed gap; grid construction pauses
    Stale { reference: Price },
    /// Still waiting for a consistent run of prices
    StillStale,
    /// A fresh reference has been established after a gap
    Fresh { reference: Price },
}

/// Detects feed gaps and decides when a new reference can be trusted
#[derive(Debug, Clone)]
pub struct ReferenceGuard {
    max_gap: Price,
    required: u32,
    last_accepted: Option<Price>,
    candidate: Option<(Price, u32)>,
}

impl ReferenceGuard {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            max_gap: config.max_reference_gap(),
            required: config.fresh_reference_ticks,
            last_accepted: None,
            candidate: None,
        }
    }

    pub fn max_gap(&self) -> Price {
        self.max_gap
    }

    pub fn is_paused(&self) -> bool {
        self.candidate.is_some()
    }

    pub fn observe(&mut self, price: Price) -> GuardVerdict {
        let Some(last) = self.last_accepted else {
            self.last_accepted = Some(price);
            return GuardVerdict::Accepted;
        };

        if (price - last).abs() <= self.max_gap {
            if self.candidate.take().is_some() {
                debug!("[GRID] Price {} back within range of {}", price, last);
            }
            self.last_accepted = Some(price);
            return GuardVerdict::Accepted;
        }

        let (count, first) = match self.candidate {
            Some((candidate, n)) if (price - candidate).abs() <= self.max_gap => (n + 1, false),
            Some(_) => (1, false),
            None => (1, true),
        };

        if count >= self.required {
            self.candidate = None;
            self.last_accepted = Some(price);
            return GuardVerdict::Fresh { reference: price };
        }

        self.candidate = Some((price, count));
        if first {
            GuardVerdict::Stale { reference: last }
        } else {
            GuardVerdict::StillStale
        }
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use basket_core::IntentAction;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn config() -> GridConfig {
        GridConfig {
            step: dec!(10),
            levels_per_side: 3,
            ..Default::default()
        }
    }

    fn instrument() -> Instrument {
        Instrument::new("TEST", dec!(0.01), dec!(0.01), dec!(0.01))
    }

    fn request(reference: Decimal, filled: &[(Side, Price)]) -> GridRequest<'_> {
        GridRequest {
            reference,
            step: dec!(10),
            levels_per_side: 3,
            allowed: EntrySignal::both(),
            filled,
            now: now(),
        }
    }

    fn unit(_: Side) -> Result<Volume> {
        Ok(dec!(1))
    }

    fn prices(grid: &GridController, side: Side) -> Vec<Price> {
        let mut p: Vec<Price> = grid
            .pending()
            .iter()
            .filter(|l| l.side == side)
            .map(|l| l.target_price)
            .collect();
        p.sort();
        p
    }

    #[test]
    fn test_symmetric_limit_grid() {
        let mut grid = GridController::new(&config(), instrument());
        let intents = grid.build_grid(request(dec!(100), &[]), unit);

        assert_eq!(intents.len(), 6);
        assert!(intents.iter().all(|i| i.action == IntentAction::Place));
        assert_eq!(prices(&grid, Side::Buy), vec![dec!(70), dec!(80), dec!(90)]);
        assert_eq!(prices(&grid, Side::Sell), vec![dec!(110), dec!(120), dec!(130)]);
        assert_eq!(grid.reference(), Some(dec!(100)));
    }

    #[test]
    fn test_stop_entries_ladder_outward() {
        let cfg = GridConfig {
            entry: GridEntry::Stop,
            mode: GridMode::LongOnly,
            ..config()
        };
        let mut grid = GridController::new(&cfg, instrument());
        let intents = grid.build_grid(request(dec!(100), &[]), unit);

        assert_eq!(intents.len(), 3);
        assert_eq!(prices(&grid, Side::Buy), vec![dec!(110), dec!(120), dec!(130)]);
        assert!(grid.pending().iter().all(|l| l.index > 0));
    }

    #[test]
    fn test_rebuild_skips_occupied_levels() {
        let mut grid = GridController::new(&config(), instrument());
        grid.build_grid(request(dec!(100), &[]), unit);

        // Shifted by less than step/2: every level collides
        let again = grid.build_grid(request(dec!(104), &[]), unit);
        assert!(again.is_empty());

        // Filled prices also block their level
        let mut fresh = GridController::new(&config(), instrument());
        let filled = [(Side::Buy, dec!(90)), (Side::Sell, dec!(90))];
        let intents = fresh.build_grid(request(dec!(100), &filled), unit);
        assert_eq!(intents.len(), 5);
        assert_eq!(prices(&fresh, Side::Buy), vec![dec!(70), dec!(80)]);
    }

    #[test]
    fn test_levels_exactly_half_step_apart_are_allowed() {
        let mut grid = GridController::new(&config(), instrument());
        grid.build_grid(request(dec!(100), &[]), unit);
        let intents = grid.build_grid(request(dec!(105), &[]), unit);
        assert_eq!(intents.len(), 6);

        for side in [Side::Buy, Side::Sell] {
            let p = prices(&grid, side);
            assert!(p.windows(2).all(|w| w[1] - w[0] >= dec!(5)));
        }
    }

    #[test]
    fn test_sizing_error_skips_level() {
        let mut grid = GridController::new(&config(), instrument());
        let mut calls = 0;
        let intents = grid.build_grid(request(dec!(100), &[]), |_| {
            calls += 1;
            if calls % 2 == 0 {
                Err(Error::Sizing {
                    computed: dec!(0),
                    minimum: dec!(0.01),
                })
            } else {
                Ok(dec!(1))
            }
        });
        assert_eq!(intents.len(), 3);
    }

    #[test]
    fn test_recenter_shifts_by_whole_steps() {
        let mut grid = GridController::new(&config(), instrument());
        grid.build_grid(request(dec!(100), &[]), unit);

        assert!(grid.recenter(dec!(109)).is_none());

        let cancels = grid.recenter(dec!(125)).unwrap();
        assert_eq!(grid.reference(), Some(dec!(120)));
        // Sells at 110/120 are no longer above the reference, buys at 70/80 are out of reach
        assert!(cancels.iter().all(|c| c.action == IntentAction::Cancel));
        assert_eq!(cancels.len(), 4);
        assert_eq!(prices(&grid, Side::Sell), vec![dec!(130)]);
        assert_eq!(prices(&grid, Side::Buy), vec![dec!(90)]);
    }

    #[test]
    fn test_expire_clears_reference_when_flat() {
        let cfg = GridConfig {
            pending_expiration_secs: Some(60),
            ..config()
        };
        let mut grid = GridController::new(&cfg, instrument());
        grid.build_grid(request(dec!(100), &[]), unit);

        assert!(grid.expire_pending(now() + Duration::seconds(59), true).is_empty());
        let cancels = grid.expire_pending(now() + Duration::seconds(60), true);
        assert_eq!(cancels.len(), 6);
        assert!(grid.is_empty());
        assert_eq!(grid.reference(), None);
    }

    #[test]
    fn test_expire_keeps_reference_when_not_flat() {
        let cfg = GridConfig {
            pending_expiration_secs: Some(60),
            ..config()
        };
        let mut grid = GridController::new(&cfg, instrument());
        grid.build_grid(request(dec!(100), &[]), unit);
        grid.expire_pending(now() + Duration::seconds(61), false);
        assert_eq!(grid.reference(), Some(dec!(100)));
    }

    #[test]
    fn test_cancel_is_noop_for_unknown_or_filled() {
        let mut grid = GridController::new(&config(), instrument());
        let intents = grid.build_grid(request(dec!(100), &[]), unit);
        let id = intents[0].order_id;

        assert!(grid.on_filled(id, dec!(1)).is_some());
        assert!(grid.cancel(id).is_none());
        assert!(grid.cancel(uuid_like()).is_none());
        assert_eq!(grid.pending().len(), 5);
    }

    #[test]
    fn test_partial_fill_keeps_remainder_pending() {
        let mut grid = GridController::new(&config(), instrument());
        let intents = grid.build_grid(request(dec!(100), &[]), unit);
        let id = intents[0].order_id;

        let level = grid.on_filled(id, dec!(0.4)).unwrap();
        assert_eq!(level.volume, dec!(0.6));
        assert!(grid.contains(id));

        // Remainder is still cancelled with its side
        let cancels = grid.cancel_side(intents[0].side);
        assert!(cancels.iter().any(|c| c.order_id == id));

        let intents = grid.build_grid(request(dec!(100), &[]), unit);
        let id = intents[0].order_id;
        grid.on_filled(id, dec!(0.4));
        let level = grid.on_filled(id, dec!(0.6)).unwrap();
        assert!(level.volume.is_zero());
        assert!(!grid.contains(id));
    }

    #[test]
    fn test_rejected_level_waits_for_reference_move() {
        let mut grid = GridController::new(&config(), instrument());
        let intents = grid.build_grid(request(dec!(100), &[]), unit);
        let refused = grid.reject(intents[0].order_id).unwrap();
        assert_eq!((refused.side, refused.target_price), (Side::Buy, dec!(90)));

        // Same reference: nothing to place
        assert!(grid.build_grid(request(dec!(100), &[]), unit).is_empty());

        let intents = grid.build_grid(request(dec!(110), &[]), unit);
        let buys: Vec<Option<Price>> = intents
            .iter()
            .filter(|i| i.side == Side::Buy)
            .map(|i| i.price)
            .collect();
        assert_eq!(buys, vec![Some(dec!(100)), Some(dec!(90))]);
        assert_eq!(intents.len(), 3);
    }

    fn uuid_like() -> OrderId {
        OrderIntent::place(
            Side::Buy,
            basket_core::OrderType::Market,
            None,
            dec!(1),
            IntentPurpose::StopLoss,
        )
        .order_id
    }

    #[test]
    fn test_guard_pauses_then_accepts_fresh_reference() {
        let cfg = GridConfig {
            step: dec!(10),
            max_reference_gap_steps: dec!(5),
            fresh_reference_ticks: 3,
            ..Default::default()
        };
        let mut guard = ReferenceGuard::new(&cfg);

        assert_eq!(guard.observe(dec!(100)), GuardVerdict::Accepted);
        assert_eq!(guard.observe(dec!(140)), GuardVerdict::Accepted);
        assert_eq!(
            guard.observe(dec!(300)),
            GuardVerdict::Stale {
                reference: dec!(140)
            }
        );
        assert!(guard.is_paused());
        assert_eq!(guard.observe(dec!(305)), GuardVerdict::StillStale);
        assert_eq!(
            guard.observe(dec!(302)),
            GuardVerdict::Fresh {
                reference: dec!(302)
            }
        );
        assert!(!guard.is_paused());
    }

    #[test]
    fn test_guard_recovers_when_price_returns() {
        let cfg = GridConfig {
            step: dec!(10),
            max_reference_gap_steps: dec!(5),
            ..Default::default()
        };
        let mut guard = ReferenceGuard::new(&cfg);
        guard.observe(dec!(100));
        assert!(matches!(guard.observe(dec!(500)), GuardVerdict::Stale { .. }));
        assert_eq!(guard.observe(dec!(101)), GuardVerdict::Accepted);
        assert!(!guard.is_paused());
    }
}
