//! Basket Engine
//!
//! One engine per instrument. Every input (tick, fill, equity snapshot,
//! signal, rejection) is processed to completion and answered with the
//! order intents and telemetry it produced.
//!
//! ```text
//!   Tick ──► ReferenceGuard ──► GridController ──► grid Place/Cancel
//!                                     │
//!   Fill ──► BasketLedger ──► ProtectiveOrderManager ──► SL/TP Place/Replace/Cancel
//!                  │
//!   Equity ──► RiskGovernor ──► CloseLeg (Market) intents
//! ```
//!
//! Per side the basket moves `Empty -> Building -> Closing -> Empty`. Entering
//! `Empty` cancels the side's remaining orders, reports the realized result,
//! and restarts sizing from the base volume.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::grid::{GridController, GridRequest, GuardVerdict, ReferenceGuard};
use crate::ledger::{BasketLedger, FillOutcome};
use crate::protective::ProtectiveOrderManager;
use crate::risk::RiskGovernor;
use basket_core::{
    EntrySignal, Equity, FillEvent, IntentPurpose, LegId, OrderId, OrderIntent, OrderType, Price,
    Side, TelemetryEvent, Tick, Timestamp, Volume,
};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Host-facing capability interface of a basket strategy
pub trait BasketStrategy: Send {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Called for every market-data tick or closed candle
    fn on_tick(&mut self, tick: &Tick) -> EngineOutput;

    /// Called for every fill notification (possibly duplicated)
    fn on_fill(&mut self, fill: &FillEvent) -> EngineOutput;

    /// Called with each equity snapshot (optional)
    fn on_equity(&mut self, _equity: Equity) -> EngineOutput {
        EngineOutput::default()
    }

    /// Called when the signal source permits entries (optional)
    fn on_signal(&mut self, _signal: EntrySignal) -> EngineOutput {
        EngineOutput::default()
    }

    /// Called when the gateway refused an intent
    fn on_rejection(&mut self, order_id: OrderId, reason: &str) -> EngineOutput;

    /// Called periodically for time-based housekeeping (optional)
    fn on_timer(&mut self, _now: Timestamp) -> EngineOutput {
        EngineOutput::default()
    }

    /// Drop all state, cancelling everything outstanding
    fn reset(&mut self) -> EngineOutput;
}

/// Everything one input produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    pub intents: Vec<OrderIntent>,
    pub events: Vec<TelemetryEvent>,
}

impl EngineOutput {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.events.is_empty()
    }

    pub fn append(&mut self, mut other: EngineOutput) {
        self.intents.append(&mut other.intents);
        self.events.append(&mut other.events);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BasketPhase {
    #[default]
    Empty,
    Building,
    Closing,
}

/// Per-side lifecycle and the running result of the current cycle
#[derive(Debug, Clone, Default)]
struct SideState {
    phase: BasketPhase,
    last_volume: Option<Volume>,
    realized_volume: Volume,
    realized_pnl: Decimal,
}

/// An equity-cut close intent still waiting for its fill
#[derive(Debug, Clone)]
struct PendingClose {
    side: Side,
    leg_id: LegId,
    remaining: Volume,
}

pub struct BasketEngine {
    config: EngineConfig,
    grid: GridController,
    guard: ReferenceGuard,
    ledger: BasketLedger,
    protection: ProtectiveOrderManager,
    risk: RiskGovernor,
    long: SideState,
    short: SideState,
    pending_closes: HashMap<OrderId, PendingClose>,
    active_signal: Option<EntrySignal>,
    last_tick: Option<Tick>,
    /// Price of the latest applied fill; marks legs until a tick arrives
    last_fill_price: Option<Price>,
    last_equity: Option<Equity>,
    needs_reconcile: bool,
    total_realized: Decimal,
}

impl BasketEngine {
    /// Validate `config` and build an idle engine
    pub fn start(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "[ENGINE] Starting {} (step {}, {} levels/side, {:?} {:?})",
            config.instrument.symbol,
            config.grid.step,
            config.grid.levels_per_side,
            config.grid.mode,
            config.grid.entry
        );

        Ok(Self {
            grid: GridController::new(&config.grid, config.instrument.clone()),
            guard: ReferenceGuard::new(&config.grid),
            ledger: BasketLedger::new(),
            protection: ProtectiveOrderManager::new(
                config.instrument.clone(),
                config.protection.trailing,
            ),
            risk: RiskGovernor::new(&config),
            long: SideState::default(),
            short: SideState::default(),
            pending_closes: HashMap::new(),
            active_signal: None,
            last_tick: None,
            last_fill_price: None,
            last_equity: None,
            needs_reconcile: false,
            total_realized: Decimal::ZERO,
            config,
        })
    }

    /// Start and establish the equity baseline in one step
    pub fn start_with_equity(config: EngineConfig, equity: Equity) -> Result<Self> {
        let mut engine = Self::start(config)?;
        engine.risk.start(equity);
        engine.last_equity = Some(equity);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &BasketLedger {
        &self.ledger
    }

    pub fn grid(&self) -> &GridController {
        &self.grid
    }

    pub fn protection(&self) -> &ProtectiveOrderManager {
        &self.protection
    }

    pub fn risk(&self) -> &RiskGovernor {
        &self.risk
    }

    pub fn phase(&self, side: Side) -> BasketPhase {
        self.side(side).phase
    }

    /// Realized PnL across every basket cycle since start or reset
    pub fn realized_pnl(&self) -> Decimal {
        self.total_realized
    }

    /// Whether grid construction is paused on a stale reference
    pub fn is_paused(&self) -> bool {
        self.guard.is_paused()
    }

    fn side(&self, side: Side) -> &SideState {
        match side {
            Side::Buy => &self.long,
            Side::Sell => &self.short,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Buy => &mut self.long,
            Side::Sell => &mut self.short,
        }
    }

    fn build_grid_at(
        &mut self,
        reference: Price,
        allowed: EntrySignal,
        now: Timestamp,
        out: &mut EngineOutput,
    ) {
        let filled: Vec<(Side, Price)> = self
            .ledger
            .all_legs()
            .map(|l| (l.side, l.fill_price))
            .collect();
        let request = GridRequest {
            reference,
            step: self.config.grid.step,
            levels_per_side: self.config.grid.levels_per_side,
            allowed,
            filled: &filled,
            now,
        };

        let risk = &self.risk;
        let equity = self.last_equity;
        let mut last = [self.long.last_volume, self.short.last_volume];
        let intents = self.grid.build_grid(request, |side| {
            let slot = &mut last[side_index(side)];
            let volume = risk.leg_volume(*slot, equity)?;
            *slot = Some(volume);
            Ok(volume)
        });

        if !intents.is_empty() {
            out.events.push(TelemetryEvent::GridRebuilt {
                reference,
                levels: intents.len(),
            });
        }
        out.intents.extend(intents);
    }

    fn stamp(&mut self, side: Side) {
        let tp = self.protection.first_target_price(side);
        let sl = self.protection.stop_price(side);
        self.ledger.stamp_protection(side, tp, sl);
    }

    fn closing_in_flight(&self, side: Side) -> bool {
        self.pending_closes.values().any(|p| p.side == side)
            || self.protection.exit_in_progress(side)
    }

    /// Re-derive protection and lifecycle of `side` after its basket changed
    fn settle_side(&mut self, side: Side, now: Timestamp, out: &mut EngineOutput) {
        let previous = self.side(side).phase;
        if self.ledger.basket(side).is_empty() {
            if previous != BasketPhase::Empty {
                self.close_basket(side, now, out);
            }
            return;
        }

        let intents = self.protection.refresh(
            self.ledger.basket(side),
            self.config.protection.tp_distance,
            self.config.protection.sl_distance,
            self.config.protection.tiers.as_deref(),
        );
        out.intents.extend(intents);
        self.stamp(side);

        let phase = if self.closing_in_flight(side) {
            BasketPhase::Closing
        } else {
            BasketPhase::Building
        };
        if phase != previous {
            debug!("[ENGINE] {} basket {:?} -> {:?}", side, previous, phase);
        }
        self.side_mut(side).phase = phase;
    }

    fn close_basket(&mut self, side: Side, now: Timestamp, out: &mut EngineOutput) {
        out.intents.extend(self.protection.cancel_side(side));
        out.intents.extend(self.grid.cancel_side(side));

        let cycle = std::mem::take(self.side_mut(side));
        info!(
            "[ENGINE] {} basket closed: {} realized, PnL {}",
            side, cycle.realized_volume, cycle.realized_pnl
        );
        out.events.push(TelemetryEvent::BasketClosed {
            side,
            realized_volume: cycle.realized_volume,
            realized_pnl: cycle.realized_pnl,
            timestamp: now,
        });

        if self.ledger.is_flat() && self.grid.is_empty() {
            self.grid.clear_reference();
            return;
        }
        // Re-lay this side's levels at base volume around the current reference
        if let (Some(reference), Some(signal)) = (self.grid.reference(), self.active_signal) {
            if signal.allows(side) && !self.guard.is_paused() {
                let only = match side {
                    Side::Buy => EntrySignal::long_only(),
                    Side::Sell => EntrySignal::short_only(),
                };
                self.build_grid_at(reference, only, now, out);
            }
        }
    }

    /// Forced refresh after a rejection: protection from basket state, and
    /// missing grid levels around the current reference
    fn reconcile(&mut self, now: Timestamp, out: &mut EngineOutput) {
        self.needs_reconcile = false;
        info!("[ENGINE] Reconciling orders with basket state");
        for side in [Side::Buy, Side::Sell] {
            if !self.ledger.basket(side).is_empty() {
                self.settle_side(side, now, out);
            }
        }
        if let (Some(reference), Some(signal)) = (self.grid.reference(), self.active_signal) {
            self.build_grid_at(reference, signal, now, out);
        }
    }

    fn apply_outcome(&mut self, outcome: FillOutcome, now: Timestamp, out: &mut EngineOutput) {
        let mut touched = Vec::with_capacity(2);

        if let Some(side) = outcome.reduced_side() {
            let pnl = outcome.realized_pnl();
            let state = self.side_mut(side);
            state.realized_volume += outcome.realized_volume();
            state.realized_pnl += pnl;
            self.total_realized += pnl;
            for r in &outcome.reductions {
                debug!(
                    "[ENGINE] Leg {} reduced by {} @ {} (PnL {})",
                    r.leg_id, r.volume, r.exit_price, r.realized_pnl
                );
            }
            touched.push(side);
        }

        if let Some(leg) = &outcome.opened {
            info!(
                "[ENGINE] Leg {} opened: {} {} @ {}",
                leg.id, leg.side, leg.volume, leg.fill_price
            );
            out.events.push(TelemetryEvent::LegOpened {
                leg_id: leg.id,
                side: leg.side,
                price: leg.fill_price,
                volume: leg.volume,
                timestamp: leg.opened_at,
            });
            self.side_mut(leg.side).last_volume = Some(leg.volume);
            if !touched.contains(&leg.side) {
                touched.push(leg.side);
            }
        }

        for side in touched {
            self.settle_side(side, now, out);
        }
    }

    /// Update order tracking after a fill of `order_id`
    fn settle_order(&mut self, order_id: OrderId, volume: Volume) {
        if let Some(level) = self.grid.on_filled(order_id, volume) {
            if level.volume.is_zero() {
                debug!(
                    "[ENGINE] Grid level {} {} @ {} filled",
                    level.side, level.index, level.target_price
                );
            }
        } else if let Some((side, purpose)) = self.protection.on_filled(order_id, volume) {
            info!("[ENGINE] {} basket exit: {:?}", side, purpose);
        } else if let Some(pending) = self.pending_closes.get_mut(&order_id) {
            pending.remaining -= volume;
            if pending.remaining <= Decimal::ZERO {
                self.pending_closes.remove(&order_id);
            }
        }
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

impl BasketStrategy for BasketEngine {
    fn name(&self) -> &str {
        &self.config.instrument.symbol
    }

    fn on_tick(&mut self, tick: &Tick) -> EngineOutput {
        let mut out = EngineOutput::default();
        let mid = tick.mid();
        self.last_tick = Some(tick.clone());

        match self.guard.observe(mid) {
            GuardVerdict::Accepted => {}
            GuardVerdict::Stale { reference } => {
                let err = Error::StaleReference {
                    price: mid,
                    reference,
                    max_gap: self.guard.max_gap(),
                };
                warn!("[ENGINE] {}; grid construction paused", err);
                out.events.push(TelemetryEvent::StaleReference {
                    price: mid,
                    reference,
                });
                return out;
            }
            GuardVerdict::StillStale => {
                debug!("[ENGINE] Waiting for a consistent reference ({})", mid);
                return out;
            }
            GuardVerdict::Fresh { reference } => {
                info!("[ENGINE] Fresh reference {} accepted, grid reset", reference);
                out.intents.extend(self.grid.cancel_all());
            }
        }

        out.append(self.on_timer(tick.timestamp));

        if self.needs_reconcile {
            self.reconcile(tick.timestamp, &mut out);
        }

        if self.config.grid.recenter {
            if let Some(cancels) = self.grid.recenter(mid) {
                out.intents.extend(cancels);
                if let (Some(reference), Some(signal)) = (self.grid.reference(), self.active_signal)
                {
                    self.build_grid_at(reference, signal, tick.timestamp, &mut out);
                }
            }
        }

        if self.config.grid.auto_build && self.grid.reference().is_none() {
            self.active_signal = Some(EntrySignal::both());
            self.build_grid_at(mid, EntrySignal::both(), tick.timestamp, &mut out);
        }

        for side in [Side::Buy, Side::Sell] {
            if let Some(intent) = self
                .protection
                .trail(self.ledger.basket(side), tick.exit_price(side))
            {
                out.intents.push(intent);
                self.stamp(side);
            }
        }
        out
    }

    fn on_fill(&mut self, fill: &FillEvent) -> EngineOutput {
        let mut out = EngineOutput::default();
        if self.ledger.has_seen(&fill.fill_id) {
            debug!("[ENGINE] {}", Error::DuplicateFill(fill.fill_id.clone()));
            return out;
        }
        if let Some(tick) = &self.last_tick {
            if !tick.contains(fill.price) {
                warn!(
                    "[ENGINE] Fill {} @ {} outside bar [{}, {}], applied anyway",
                    fill.fill_id, fill.price, tick.low, tick.high
                );
            }
        }

        let close_target = fill
            .order_id
            .and_then(|id| self.pending_closes.get(&id))
            .map(|p| p.leg_id);
        let result = match close_target {
            Some(leg_id) => self.ledger.apply_close_fill(fill, leg_id),
            None => self.ledger.apply_fill(fill),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[ENGINE] Fill {} not applied: {}", fill.fill_id, e);
                return out;
            }
        };

        self.last_fill_price = Some(fill.price);
        if let Some(order_id) = fill.order_id {
            self.settle_order(order_id, fill.volume);
        }
        self.apply_outcome(outcome, fill.timestamp, &mut out);
        out
    }

    fn on_equity(&mut self, equity: Equity) -> EngineOutput {
        let mut out = EngineOutput::default();
        self.last_equity = Some(equity);

        let tick = self.last_tick.clone();
        let last_fill = self.last_fill_price;
        let mark = |side: Side| match &tick {
            Some(tick) => tick.exit_price(side),
            // No quote yet; any open leg came from a fill
            None => last_fill.unwrap_or(Decimal::ZERO),
        };

        let closing: HashSet<LegId> = self.pending_closes.values().map(|p| p.leg_id).collect();
        let legs = self.ledger.all_legs().filter(|l| !closing.contains(&l.id));
        let Some(trigger) = self.risk.evaluate(equity, legs, mark) else {
            return out;
        };

        let mut leg_ids = Vec::with_capacity(trigger.legs.len());
        for leg in &trigger.legs {
            let intent = OrderIntent::place(
                leg.side.opposite(),
                OrderType::Market,
                None,
                leg.volume,
                IntentPurpose::CloseLeg { leg_id: leg.id },
            );
            self.pending_closes.insert(
                intent.order_id,
                PendingClose {
                    side: leg.side,
                    leg_id: leg.id,
                    remaining: leg.volume,
                },
            );
            self.side_mut(leg.side).phase = BasketPhase::Closing;
            leg_ids.push(leg.id);
            out.intents.push(intent);
        }

        out.events.push(TelemetryEvent::EquityTriggerFired {
            equity,
            baseline: trigger.band.baseline,
            upper_target: trigger.band.upper_target,
            lower_stop: trigger.band.lower_stop,
            legs: leg_ids,
        });
        out
    }

    fn on_signal(&mut self, signal: EntrySignal) -> EngineOutput {
        let mut out = EngineOutput::default();
        if self.guard.is_paused() {
            info!("[ENGINE] Signal ignored: grid paused on stale reference");
            return out;
        }
        let Some(tick) = self.last_tick.clone() else {
            debug!("[ENGINE] Signal ignored: no price yet");
            return out;
        };
        if self.grid.reference().is_some() {
            debug!("[ENGINE] Signal ignored: grid already active");
            return out;
        }

        self.active_signal = Some(signal);
        self.build_grid_at(tick.mid(), signal, tick.timestamp, &mut out);
        out
    }

    fn on_rejection(&mut self, order_id: OrderId, reason: &str) -> EngineOutput {
        let mut out = EngineOutput::default();
        let err = Error::ExecutionRejected {
            order_id,
            reason: reason.to_string(),
        };
        warn!("[ENGINE] {}", err);
        out.events.push(TelemetryEvent::ExecutionRejected {
            order_id,
            reason: reason.to_string(),
        });

        if let Some(level) = self.grid.reject(order_id) {
            debug!(
                "[ENGINE] Grid level {} {} @ {} refused, held until the reference moves",
                level.side, level.index, level.target_price
            );
        } else if self.protection.forget(order_id) {
            debug!("[ENGINE] Protective order {} dropped", order_id);
        } else if let Some(pending) = self.pending_closes.remove(&order_id) {
            // Leg already closed elsewhere (e.g. by TP); nothing to retry
            info!(
                "[ENGINE] Close of leg {} rejected, treated as satisfied",
                pending.leg_id
            );
            let side = pending.side;
            if self.phase(side) == BasketPhase::Closing
                && !self.ledger.basket(side).is_empty()
                && !self.closing_in_flight(side)
            {
                self.side_mut(side).phase = BasketPhase::Building;
            }
            return out;
        }

        self.needs_reconcile = true;
        out
    }

    fn on_timer(&mut self, now: Timestamp) -> EngineOutput {
        EngineOutput {
            intents: self.grid.expire_pending(now, self.ledger.is_flat()),
            events: Vec::new(),
        }
    }

    fn reset(&mut self) -> EngineOutput {
        let mut intents = self.grid.cancel_all();
        intents.extend(self.protection.cancel_all());
        info!("[ENGINE] Reset: cancelling {} orders", intents.len());

        self.ledger.reset();
        self.guard.reset();
        self.risk.reset();
        self.long = SideState::default();
        self.short = SideState::default();
        self.pending_closes.clear();
        self.active_signal = None;
        self.last_tick = None;
        self.last_fill_price = None;
        self.last_equity = None;
        self.needs_reconcile = false;
        self.total_realized = Decimal::ZERO;

        EngineOutput {
            intents,
            events: Vec::new(),
        }
    }
}
