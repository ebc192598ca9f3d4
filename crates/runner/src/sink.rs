//! Telemetry sink that writes engine events to the log

use basket_core::TelemetryEvent;
use basket_ports::TelemetrySink;
use log::{info, warn};
use std::collections::BTreeMap;

/// Logs every event and counts them by kind
#[derive(Debug, Default)]
pub struct LogSink {
    counts: BTreeMap<&'static str, u64>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.counts
    }
}

impl TelemetrySink for LogSink {
    fn publish(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::StaleReference { price, reference } => {
                warn!("[TELEMETRY] Stale reference: {} vs {}", price, reference)
            }
            TelemetryEvent::ExecutionRejected { order_id, reason } => {
                warn!("[TELEMETRY] Rejected {}: {}", order_id, reason)
            }
            _ => info!("[TELEMETRY] {}: {:?}", event.kind(), event),
        }
        *self.counts.entry(event.kind()).or_default() += 1;
    }
}
