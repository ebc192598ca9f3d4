//! Engine configuration
//!
//! Static per-instrument settings, loaded from JSON and validated before the
//! engine starts. All distances are in price units (convert pips with
//! [`InstrumentSpec::pips`]).

use crate::error::{Error, Result};
use basket_core::{Instrument, InstrumentSpec, OrderType, Price, Side, Volume};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full engine configuration for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub instrument: Instrument,
    pub grid: GridConfig,
    pub sizing: SizingConfig,
    pub protection: ProtectionConfig,
    pub equity: EquityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: Instrument::fx_major("EURUSD"),
            grid: GridConfig::default(),
            sizing: SizingConfig::default(),
            protection: ProtectionConfig::default(),
            equity: EquityConfig::default(),
        }
    }
}

/// Which sides the grid ladders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridMode {
    #[default]
    Symmetric,
    LongOnly,
    ShortOnly,
}

impl GridMode {
    pub fn includes(&self, side: Side) -> bool {
        match self {
            GridMode::Symmetric => true,
            GridMode::LongOnly => side == Side::Buy,
            GridMode::ShortOnly => side == Side::Sell,
        }
    }
}

/// How grid entries rest in the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridEntry {
    /// Counter-trend ladder: buys below the reference, sells above
    #[default]
    Limit,
    /// Breakout ladder: buys above the reference, sells below
    Stop,
}

impl GridEntry {
    pub fn order_type(&self) -> OrderType {
        match self {
            GridEntry::Limit => OrderType::Limit,
            GridEntry::Stop => OrderType::Stop,
        }
    }

    /// Direction (+1/-1) in which `side`'s levels step away from the reference
    pub fn direction(&self, side: Side) -> Decimal {
        match self {
            GridEntry::Limit => -side.sign(),
            GridEntry::Stop => side.sign(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Distance between adjacent levels
    pub step: Price,
    pub levels_per_side: u32,
    pub mode: GridMode,
    pub entry: GridEntry,
    /// Pending levels expire this long after placement
    pub pending_expiration_secs: Option<i64>,
    /// Shift the reference by whole steps as price moves
    pub recenter: bool,
    /// Build the grid on every tick without waiting for a signal
    pub auto_build: bool,
    /// A jump larger than this many steps marks the feed as stale
    pub max_reference_gap_steps: Decimal,
    /// Consecutive consistent ticks needed to accept a fresh reference (at least 2)
    pub fresh_reference_ticks: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            step: dec!(0.0010),
            levels_per_side: 3,
            mode: GridMode::Symmetric,
            entry: GridEntry::Limit,
            pending_expiration_secs: None,
            recenter: false,
            auto_build: false,
            max_reference_gap_steps: dec!(20),
            fresh_reference_ticks: 3,
        }
    }
}

impl GridConfig {
    pub fn pending_expiration(&self) -> Option<Duration> {
        self.pending_expiration_secs.map(Duration::seconds)
    }

    pub fn max_reference_gap(&self) -> Price {
        self.step * self.max_reference_gap_steps
    }
}

/// How the next leg is sized
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SizingMethod {
    /// Previous leg volume times the multiplier
    #[default]
    Martingale,
    /// Fraction of equity risked over the stop distance
    RiskPercent { risk_pct: Decimal },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub base_volume: Volume,
    pub max_volume: Volume,
    pub martingale_multiplier: Decimal,
    pub method: SizingMethod,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_volume: dec!(0.1),
            max_volume: dec!(1.0),
            martingale_multiplier: dec!(2),
            method: SizingMethod::Martingale,
        }
    }
}

/// One step of a tiered take-profit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTier {
    /// Multiple of `tp_distance` from the average price
    pub distance_multiplier: Decimal,
    /// Fraction of net volume exited at this tier
    pub exit_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingConfig {
    /// Stop distance behind the market
    pub distance: Price,
    /// Minimum favorable move before the stop is moved
    pub min_step: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    pub tp_distance: Price,
    pub sl_distance: Price,
    pub tiers: Option<Vec<TakeProfitTier>>,
    pub trailing: Option<TrailingConfig>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            tp_distance: dec!(0.0020),
            sl_distance: dec!(0.0030),
            tiers: None,
            trailing: None,
        }
    }
}

/// Order in which equally-losing legs are cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TieBreak {
    #[default]
    OldestFirst,
    NewestFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EquityConfig {
    pub gain_pct: Decimal,
    pub loss_pct: Decimal,
    pub max_legs_to_close: usize,
    pub tie_break: TieBreak,
}

impl Default for EquityConfig {
    fn default() -> Self {
        Self {
            gain_pct: dec!(0.05),
            loss_pct: dec!(0.03),
            max_legs_to_close: 2,
            tie_break: TieBreak::OldestFirst,
        }
    }
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Configuration(message()))
    }
}

fn is_fraction(value: Decimal) -> bool {
    value > Decimal::ZERO && value < Decimal::ONE
}

impl EngineConfig {
    /// Reject values the engine cannot trade with
    pub fn validate(&self) -> Result<()> {
        let instrument = &self.instrument;
        require(!instrument.symbol.is_empty(), || "empty symbol".into())?;
        require(instrument.tick_size >= Decimal::ZERO, || {
            format!("tick_size {} is negative", instrument.tick_size)
        })?;
        require(instrument.volume_step > Decimal::ZERO, || {
            format!("volume_step {} must be positive", instrument.volume_step)
        })?;
        require(instrument.min_volume > Decimal::ZERO, || {
            format!("min_volume {} must be positive", instrument.min_volume)
        })?;
        require(instrument.contract_size > Decimal::ZERO, || {
            format!("contract_size {} must be positive", instrument.contract_size)
        })?;

        let grid = &self.grid;
        require(grid.step > Decimal::ZERO, || {
            format!("grid step {} must be positive", grid.step)
        })?;
        require(grid.levels_per_side > 0, || "levels_per_side must be at least 1".into())?;
        require(grid.max_reference_gap_steps > Decimal::ONE, || {
            format!(
                "max_reference_gap_steps {} must exceed one step",
                grid.max_reference_gap_steps
            )
        })?;
        require(grid.fresh_reference_ticks >= 2, || {
            format!(
                "fresh_reference_ticks {} must be at least 2",
                grid.fresh_reference_ticks
            )
        })?;
        if let Some(secs) = grid.pending_expiration_secs {
            require(secs > 0, || format!("pending_expiration_secs {secs} must be positive"))?;
        }

        let sizing = &self.sizing;
        require(sizing.base_volume > Decimal::ZERO, || {
            format!("base_volume {} must be positive", sizing.base_volume)
        })?;
        require(instrument.is_tradable(sizing.base_volume), || {
            format!(
                "base_volume {} below min_volume {}",
                sizing.base_volume, instrument.min_volume
            )
        })?;
        require(sizing.max_volume >= sizing.base_volume, || {
            format!(
                "max_volume {} below base_volume {}",
                sizing.max_volume, sizing.base_volume
            )
        })?;
        require(sizing.martingale_multiplier >= Decimal::ONE, || {
            format!(
                "martingale_multiplier {} must be at least 1",
                sizing.martingale_multiplier
            )
        })?;
        if let SizingMethod::RiskPercent { risk_pct } = sizing.method {
            require(is_fraction(risk_pct), || {
                format!("risk_pct {risk_pct} must be in (0, 1)")
            })?;
            require(self.protection.sl_distance > Decimal::ZERO, || {
                "risk-percent sizing needs a positive sl_distance".into()
            })?;
        }

        let protection = &self.protection;
        require(protection.tp_distance >= Decimal::ZERO, || {
            format!("tp_distance {} is negative", protection.tp_distance)
        })?;
        require(protection.sl_distance >= Decimal::ZERO, || {
            format!("sl_distance {} is negative", protection.sl_distance)
        })?;
        if let Some(tiers) = &protection.tiers {
            require(!tiers.is_empty(), || "tier list is empty".into())?;
            let mut total = Decimal::ZERO;
            for (i, tier) in tiers.iter().enumerate() {
                require(tier.distance_multiplier > Decimal::ZERO, || {
                    format!("tier {i} multiplier must be positive")
                })?;
                require(
                    tier.exit_percent > Decimal::ZERO && tier.exit_percent <= Decimal::ONE,
                    || format!("tier {i} exit_percent must be in (0, 1]"),
                )?;
                total += tier.exit_percent;
            }
            require(total <= Decimal::ONE, || {
                format!("tier exit percentages sum to {total}, above 1")
            })?;
        }
        if let Some(trailing) = &protection.trailing {
            require(trailing.distance > Decimal::ZERO, || {
                "trailing distance must be positive".into()
            })?;
            require(trailing.min_step >= Decimal::ZERO, || {
                "trailing min_step is negative".into()
            })?;
        }

        let equity = &self.equity;
        require(is_fraction(equity.gain_pct), || {
            format!("gain_pct {} must be in (0, 1)", equity.gain_pct)
        })?;
        require(is_fraction(equity.loss_pct), || {
            format!("loss_pct {} must be in (0, 1)", equity.loss_pct)
        })?;
        require(equity.max_legs_to_close > 0, || {
            "max_legs_to_close must be at least 1".into()
        })?;

        Ok(())
    }
}

/// Load engine configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load and validate configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
