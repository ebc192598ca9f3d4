//! Engine events and the handle producers use to enqueue them
//!
//! Market data, fills, equity readings, signals and gateway rejections all
//! travel through one queue so the engine sees them strictly in order.

use basket_core::{EntrySignal, Equity, FillEvent, OrderId, Tick};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Everything the runner can feed into a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Tick(Tick),
    Fill(FillEvent),
    Equity(Equity),
    Signal(EntrySignal),
    /// Execution layer refused or dropped an order
    Rejected { order_id: OrderId, reason: String },
    /// Periodic housekeeping (pending-order expiry)
    Sweep,
    /// Process what is already queued, then stop
    Shutdown,
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Tick(_) => "Tick",
            EngineEvent::Fill(_) => "Fill",
            EngineEvent::Equity(_) => "Equity",
            EngineEvent::Signal(_) => "Signal",
            EngineEvent::Rejected { .. } => "Rejected",
            EngineEvent::Sweep => "Sweep",
            EngineEvent::Shutdown => "Shutdown",
        }
    }
}

/// Producer side of a runner's queue
///
/// Cheap to clone. The runner stops once every handle is dropped and the
/// queue is empty, or when it receives [`EngineEvent::Shutdown`].
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::QueueClosed)
    }

    pub fn tick(&self, tick: Tick) -> Result<()> {
        self.send(EngineEvent::Tick(tick))
    }

    pub fn fill(&self, fill: FillEvent) -> Result<()> {
        self.send(EngineEvent::Fill(fill))
    }

    pub fn equity(&self, equity: Equity) -> Result<()> {
        self.send(EngineEvent::Equity(equity))
    }

    pub fn signal(&self, signal: EntrySignal) -> Result<()> {
        self.send(EngineEvent::Signal(signal))
    }

    /// Report an asynchronous rejection from the execution layer
    pub fn rejected(&self, order_id: OrderId, reason: impl Into<String>) -> Result<()> {
        self.send(EngineEvent::Rejected {
            order_id,
            reason: reason.into(),
        })
    }

    pub fn sweep(&self) -> Result<()> {
        self.send(EngineEvent::Sweep)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineEvent::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
