//! Engine Runner - serial event loop around one strategy
//!
//! ```text
//! EngineHandle(s) ──► mpsc queue ──┐
//!                                  ├──► EngineRunner ──► strategy.on_*()
//!        feedback queue ───────────┘         │
//!              ▲                             ├──► gateway.submit(intent)
//!              │                             ├──► sink.publish(event)
//!              └─────────────────────────────┘
//!                  rejections / simulated fills
//! ```
//!
//! The strategy is only ever touched from the runner task. Gateway failures
//! and fills produced by a simulated gateway are queued as events and
//! handled before the next external event, never inline.

use basket_engine::{BasketStrategy, EngineOutput};
use basket_ports::{Clock, ExecutionGateway, TelemetrySink};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::{EngineEvent, EngineHandle};

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Name used in log lines
    pub name: String,
    /// Emit a `Sweep` at this period; none when unset
    pub sweep_interval_ms: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "basket".to_string(),
            sweep_interval_ms: None,
        }
    }
}

impl RunnerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_sweep_interval(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = Some(interval_ms);
        self
    }

    fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Counters collected while running
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStats {
    pub ticks: u64,
    pub fills: u64,
    pub equity_updates: u64,
    pub signals: u64,
    pub sweeps: u64,
    pub intents_submitted: u64,
    pub rejections: u64,
    pub telemetry_events: u64,
}

/// Drives one strategy from a serial queue
pub struct EngineRunner<S, G, T> {
    config: RunnerConfig,
    strategy: S,
    gateway: G,
    sink: T,
    clock: Arc<dyn Clock>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    /// Events caused by earlier events; served ahead of `rx`
    feedback: VecDeque<EngineEvent>,
    stats: RunnerStats,
}

impl<S, G, T> EngineRunner<S, G, T>
where
    S: BasketStrategy,
    G: ExecutionGateway,
    T: TelemetrySink,
{
    /// Create a runner and the first handle to its queue
    pub fn new(
        config: RunnerConfig,
        strategy: S,
        gateway: G,
        sink: T,
        clock: Arc<dyn Clock>,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Self {
            config,
            strategy,
            gateway,
            sink,
            clock,
            rx,
            feedback: VecDeque::new(),
            stats: RunnerStats::default(),
        };
        (runner, EngineHandle::new(tx))
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    /// Run until shutdown or until every handle is dropped
    ///
    /// Returns the strategy so callers can inspect its final state.
    pub async fn run(mut self) -> (S, RunnerStats) {
        info!(
            "[RUNNER] {} started: {} via {}",
            self.config.name,
            self.strategy.name(),
            self.gateway.name()
        );

        let mut sweep = self.config.sweep_interval().map(|period| {
            tokio::time::interval_at(tokio::time::Instant::now() + period, period)
        });

        loop {
            if let Some(event) = self.feedback.pop_front() {
                self.dispatch(event);
                continue;
            }

            let next = match sweep.as_mut() {
                Some(interval) => tokio::select! {
                    event = self.rx.recv() => event,
                    _ = interval.tick() => Some(EngineEvent::Sweep),
                },
                None => self.rx.recv().await,
            };

            match next {
                Some(EngineEvent::Shutdown) => {
                    self.drain();
                    break;
                }
                Some(event) => self.dispatch(event),
                None => break,
            }
        }

        info!(
            "[RUNNER] {} stopped: {} ticks, {} fills, {} intents, {} rejections",
            self.config.name,
            self.stats.ticks,
            self.stats.fills,
            self.stats.intents_submitted,
            self.stats.rejections
        );
        (self.strategy, self.stats)
    }

    /// Process everything already queued, including feedback it produces
    fn drain(&mut self) {
        loop {
            if let Some(event) = self.feedback.pop_front() {
                self.dispatch(event);
                continue;
            }
            match self.rx.try_recv() {
                Ok(EngineEvent::Shutdown) => {}
                Ok(event) => self.dispatch(event),
                Err(_) => break,
            }
        }
    }

    /// Handle one event and everything it causes, outside the async loop
    pub fn process(&mut self, event: EngineEvent) {
        self.dispatch(event);
        while let Some(next) = self.feedback.pop_front() {
            self.dispatch(next);
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        debug!("[RUNNER] {} <- {}", self.config.name, event.kind());
        match event {
            EngineEvent::Tick(tick) => {
                self.stats.ticks += 1;
                let output = self.strategy.on_tick(&tick);
                self.execute(output);
                for fill in self.gateway.poll_fills(&tick) {
                    self.enqueue(EngineEvent::Fill(fill));
                }
            }
            EngineEvent::Fill(fill) => {
                self.stats.fills += 1;
                let output = self.strategy.on_fill(&fill);
                self.execute(output);
            }
            EngineEvent::Equity(equity) => {
                self.stats.equity_updates += 1;
                let output = self.strategy.on_equity(equity);
                self.execute(output);
            }
            EngineEvent::Signal(signal) => {
                self.stats.signals += 1;
                let output = self.strategy.on_signal(signal);
                self.execute(output);
            }
            EngineEvent::Rejected { order_id, reason } => {
                self.stats.rejections += 1;
                let output = self.strategy.on_rejection(order_id, &reason);
                self.execute(output);
            }
            EngineEvent::Sweep => {
                self.stats.sweeps += 1;
                let output = self.strategy.on_timer(self.clock.now());
                self.execute(output);
            }
            EngineEvent::Shutdown => {}
        }
    }

    fn execute(&mut self, output: EngineOutput) {
        for intent in &output.intents {
            self.stats.intents_submitted += 1;
            debug!(
                "[RUNNER] {:?} {} {:?} {:?} x {} ({:?})",
                intent.action,
                intent.side,
                intent.order_type,
                intent.price,
                intent.volume,
                intent.purpose
            );
            if let Err(err) = self.gateway.submit(intent) {
                warn!(
                    "[RUNNER] {} refused order {}: {}",
                    self.gateway.name(),
                    intent.order_id,
                    err
                );
                self.enqueue(EngineEvent::Rejected {
                    order_id: err.order_id().unwrap_or(intent.order_id),
                    reason: err.to_string(),
                });
            }
        }

        for event in &output.events {
            self.stats.telemetry_events += 1;
            self.sink.publish(event);
        }
    }

    fn enqueue(&mut self, event: EngineEvent) {
        self.feedback.push_back(event);
    }
}
