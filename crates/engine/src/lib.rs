//! Basket Engine
//!
//! Order management for a basket of simultaneous entries on one instrument:
//! - **Grid**: pending entry levels around a reference price, recentering and expiry
//! - **Ledger**: filled legs per side, net volume and weighted average, netting
//! - **Protection**: stop-loss and (tiered) take-profit kept in line with the average
//! - **Risk**: equity band cuts and martingale / risk-percent leg sizing
//!
//! ## Architecture
//!
//! ```text
//! Signal Source ──► EntrySignal ──┐
//!                                 ▼
//! Market Data ──► Tick ──► ┌──────────────────────────────────────┐
//!                          │             BasketEngine             │
//!                          │  ┌────────────────┐  ┌────────────┐  │
//!                          │  │ GridController │  │RiskGovernor│  │ ◄── Equity
//!                          │  └───────┬────────┘  └─────┬──────┘  │
//!                          │          │ levels          │ cuts    │
//!                          │  ┌───────▼─────────────────▼──────┐  │
//!                          │  │          BasketLedger          │  │
//!                          │  └───────────────┬────────────────┘  │
//!                          │                  │ basket            │
//!                          │  ┌───────────────▼────────────────┐  │
//!                          │  │     ProtectiveOrderManager     │  │
//!                          │  └────────────────────────────────┘  │
//!                          └──────────────────┬───────────────────┘
//!                                             │ OrderIntent / TelemetryEvent
//! Gateway ◄───────────────────────────────────┘
//! Gateway ──► FillEvent / rejection ──► BasketEngine
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basket_engine::{BasketEngine, BasketStrategy, load_config};
//!
//! let config = load_config("eurusd.json")?;
//! let mut engine = BasketEngine::start(config)?;
//!
//! let out = engine.on_tick(&tick);
//! let out = engine.on_signal(EntrySignal::both());
//! for intent in out.intents {
//!     gateway.submit(&intent)?;
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod protective;
pub mod risk;

// Re-export main types
pub use config::{
    EngineConfig, EquityConfig, GridConfig, GridEntry, GridMode, ProtectionConfig, SizingConfig,
    SizingMethod, TakeProfitTier, TieBreak, TrailingConfig, load_config, load_config_from_str,
};
pub use engine::{BasketEngine, BasketPhase, BasketStrategy, EngineOutput};
pub use error::{Error, Result};
pub use grid::{GridController, GridLevel, GridRequest, GuardVerdict, ReferenceGuard};
pub use ledger::{Basket, BasketLedger, FillOutcome, Leg, LegReduction};
pub use protective::{ProtectiveOrder, ProtectiveOrderManager};
pub use risk::{EquityBand, EquityTrigger, RiskGovernor};
