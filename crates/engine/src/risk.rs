//! Risk Governor
//!
//! Two jobs:
//! - Size the next leg (martingale chain or risk-percent of equity).
//! - Watch account equity against a band around a baseline and, when either
//!   edge is crossed, pick the worst open legs to cut.
//!
//! The governor never touches the ledger; it reads legs and returns a
//! decision the engine turns into close intents.

use crate::config::{EngineConfig, EquityConfig, SizingConfig, SizingMethod, TieBreak};
use crate::error::{Error, Result};
use crate::ledger::Leg;
use basket_core::{Equity, Instrument, InstrumentSpec, Price, Side, Volume};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Equity targets around a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityBand {
    pub baseline: Equity,
    pub upper_target: Equity,
    pub lower_stop: Equity,
}

impl EquityBand {
    pub fn around(baseline: Equity, gain_pct: Decimal, loss_pct: Decimal) -> Self {
        Self {
            baseline,
            upper_target: baseline * (Decimal::ONE + gain_pct),
            lower_stop: baseline * (Decimal::ONE - loss_pct),
        }
    }

    pub fn breached(&self, equity: Equity) -> bool {
        equity >= self.upper_target || equity <= self.lower_stop
    }
}

/// An equity trigger fired
#[derive(Debug, Clone)]
pub struct EquityTrigger {
    pub equity: Equity,
    /// Band that was crossed
    pub band: EquityBand,
    /// Legs to close, worst first
    pub legs: Vec<Leg>,
}

pub struct RiskGovernor {
    instrument: Instrument,
    sizing: SizingConfig,
    equity: EquityConfig,
    sl_distance: Price,
    band: Option<EquityBand>,
}

impl RiskGovernor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            instrument: config.instrument.clone(),
            sizing: config.sizing.clone(),
            equity: config.equity.clone(),
            sl_distance: config.protection.sl_distance,
            band: None,
        }
    }

    pub fn band(&self) -> Option<EquityBand> {
        self.band
    }

    /// Set the baseline to `equity`
    pub fn start(&mut self, equity: Equity) -> EquityBand {
        let band = EquityBand::around(equity, self.equity.gain_pct, self.equity.loss_pct);
        info!(
            "[RISK] Equity baseline {} (target {}, stop {})",
            band.baseline, band.upper_target, band.lower_stop
        );
        self.band = Some(band);
        band
    }

    /// Check `equity` against the band
    ///
    /// On a breach, selects up to `max_legs_to_close` legs with the most
    /// negative unrealized PnL (marked with `mark`) and resets the baseline
    /// to `equity`. The first observation only establishes the baseline.
    pub fn evaluate<'a>(
        &mut self,
        equity: Equity,
        legs: impl IntoIterator<Item = &'a Leg>,
        mark: impl Fn(Side) -> Price,
    ) -> Option<EquityTrigger> {
        let Some(band) = self.band else {
            self.start(equity);
            return None;
        };
        if !band.breached(equity) {
            return None;
        }

        let mut ranked: Vec<(Decimal, &Leg)> = legs
            .into_iter()
            .map(|leg| (leg.unrealized_pnl(mark(leg.side)), leg))
            .collect();
        let tie_break = self.equity.tie_break;
        ranked.sort_by(|(a_pnl, a), (b_pnl, b)| {
            a_pnl.cmp(b_pnl).then_with(|| {
                let age = a.opened_at.cmp(&b.opened_at);
                match tie_break {
                    TieBreak::OldestFirst => age,
                    TieBreak::NewestFirst => age.reverse(),
                }
                .then(a.id.cmp(&b.id))
            })
        });

        let selected: Vec<Leg> = ranked
            .into_iter()
            .take(self.equity.max_legs_to_close)
            .map(|(_, leg)| leg.clone())
            .collect();

        let direction = if equity >= band.upper_target {
            "target"
        } else {
            "stop"
        };
        info!(
            "[RISK] Equity {} crossed {} (baseline {}): closing {} legs",
            equity,
            direction,
            band.baseline,
            selected.len()
        );
        self.start(equity);

        Some(EquityTrigger {
            equity,
            band,
            legs: selected,
        })
    }

    /// Martingale step: `min(last * multiplier, max_volume)` rounded down
    ///
    /// Zero when the result falls below the instrument's minimum volume.
    pub fn next_leg_volume(&self, last: Volume) -> Volume {
        let raw = (last * self.sizing.martingale_multiplier).min(self.sizing.max_volume);
        self.tradable_or_zero(raw)
    }

    /// `equity * risk_pct / (sl_distance * contract_size)`, capped and rounded down
    pub fn risk_percent_volume(&self, equity: Equity, risk_pct: Decimal) -> Volume {
        let risk_per_lot = self.sl_distance * self.instrument.contract_size();
        if risk_per_lot <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = (equity * risk_pct / risk_per_lot).min(self.sizing.max_volume);
        self.tradable_or_zero(raw)
    }

    fn tradable_or_zero(&self, raw: Volume) -> Volume {
        let volume = self.instrument.round_volume_down(raw);
        if self.instrument.is_tradable(volume) {
            volume
        } else {
            Decimal::ZERO
        }
    }

    /// Volume for the next leg of a basket whose previous leg was `last`
    pub fn leg_volume(&self, last: Option<Volume>, equity: Option<Equity>) -> Result<Volume> {
        let base = || self.tradable_or_zero(self.sizing.base_volume);
        let computed = match self.sizing.method {
            SizingMethod::Martingale => last.map_or_else(base, |l| self.next_leg_volume(l)),
            SizingMethod::RiskPercent { risk_pct } => {
                equity.map_or_else(base, |e| self.risk_percent_volume(e, risk_pct))
            }
        };
        if computed.is_zero() {
            debug!("[RISK] Sizing produced no tradable volume (last {:?})", last);
            return Err(Error::Sizing {
                computed,
                minimum: self.instrument.min_volume(),
            });
        }
        Ok(computed)
    }

    pub fn reset(&mut self) {
        self.band = None;
    }
}
