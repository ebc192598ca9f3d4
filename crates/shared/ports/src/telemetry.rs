use basket_core::TelemetryEvent;

/// Port for telemetry consumers (operators, supervising strategies)
pub trait TelemetrySink: Send {
    fn publish(&mut self, event: &TelemetryEvent);
}

impl TelemetrySink for Vec<TelemetryEvent> {
    fn publish(&mut self, event: &TelemetryEvent) {
        self.push(event.clone());
    }
}
