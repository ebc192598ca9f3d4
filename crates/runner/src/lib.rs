//! Basket Runner - host runtime for the basket engine
//!
//! Everything around the engine that touches the outside world:
//!
//! - **Event queue**: one serial tokio queue per engine; every input and
//!   every gateway failure passes through it
//! - **Engine runner**: applies queued events to a [`BasketStrategy`] and
//!   forwards its intents and telemetry
//! - **Paper gateway**: fills resting intents against replayed ticks
//! - **Log sink**: telemetry to the log
//! - **Replay**: tick files for `basket-replay`
//!
//! ## Architecture
//!
//! ```text
//!   Tick file / feed      Signal source      Account equity
//!          │                    │                  │
//!          └──────────┬─────────┴──────────────────┘
//!                     ▼ EngineHandle
//!             ┌───────────────┐
//!             │  mpsc queue   │◄──────────────────────────┐
//!             └───────┬───────┘                           │
//!                     ▼                                   │ fills /
//!             ┌───────────────┐   intents   ┌─────────────┴──┐ rejections
//!             │ EngineRunner  │────────────►│ PaperGateway   │
//!             │ (BasketEngine)│             └────────────────┘
//!             └───────┬───────┘
//!                     │ telemetry
//!                     ▼
//!             ┌───────────────┐
//!             │    LogSink    │
//!             └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basket_runner::{EngineRunner, LogSink, PaperGateway, RunnerConfig};
//!
//! let (runner, handle) = EngineRunner::new(
//!     RunnerConfig::named("EURUSD"),
//!     engine,
//!     PaperGateway::new(),
//!     LogSink::new(),
//!     Arc::new(SystemClock::new()),
//! );
//! let task = tokio::spawn(runner.run());
//! handle.tick(tick)?;
//! handle.shutdown()?;
//! let (engine, stats) = task.await?;
//! ```
//!
//! [`BasketStrategy`]: basket_engine::BasketStrategy

pub mod error;
pub mod event;
pub mod paper;
pub mod replay;
pub mod runner;
pub mod sink;

// Re-export main types
pub use error::{Error, Result};
pub use event::{EngineEvent, EngineHandle};
pub use paper::PaperGateway;
pub use replay::{load_ticks, parse_ticks};
pub use runner::{EngineRunner, RunnerConfig, RunnerStats};
pub use sink::LogSink;
