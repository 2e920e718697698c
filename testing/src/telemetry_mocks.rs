//! Telemetry sink that keeps every record for later assertions.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use capture_order_core::telemetry::{DependencyRecord, EventRecord, RequestRecord, Telemetry};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Records {
    events: Vec<EventRecord>,
    dependencies: Vec<DependencyRecord>,
    exceptions: Vec<String>,
    requests: Vec<RequestRecord>,
}

/// Recording [`Telemetry`] implementation.
///
/// Exceptions are stored as their `Display` text.
#[derive(Clone, Debug, Default)]
pub struct RecordingTelemetry {
    records: Arc<Mutex<Records>>,
}

impl RecordingTelemetry {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events
    #[must_use]
    pub fn events(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().events.clone()
    }

    /// Recorded events with the given name
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<EventRecord> {
        self.events().into_iter().filter(|e| e.name == name).collect()
    }

    /// All recorded dependency calls
    #[must_use]
    pub fn dependencies(&self) -> Vec<DependencyRecord> {
        self.records.lock().unwrap().dependencies.clone()
    }

    /// Recorded dependency calls with the given `data` (operation)
    #[must_use]
    pub fn dependencies_for(&self, data: &str) -> Vec<DependencyRecord> {
        self.dependencies()
            .into_iter()
            .filter(|d| d.data == data)
            .collect()
    }

    /// All recorded exceptions
    #[must_use]
    pub fn exceptions(&self) -> Vec<String> {
        self.records.lock().unwrap().exceptions.clone()
    }

    /// All recorded requests
    #[must_use]
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.records.lock().unwrap().requests.clone()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        *self.records.lock().unwrap() = Records::default();
    }
}

impl Telemetry for RecordingTelemetry {
    fn record_event(&self, event: EventRecord) {
        self.records.lock().unwrap().events.push(event);
    }

    fn record_dependency(&self, dependency: DependencyRecord) {
        self.records.lock().unwrap().dependencies.push(dependency);
    }

    fn record_exception(&self, error: &(dyn std::error::Error + 'static)) {
        self.records
            .lock()
            .unwrap()
            .exceptions
            .push(error.to_string());
    }

    fn record_request(&self, request: RequestRecord) {
        self.records.lock().unwrap().requests.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_order_core::broker::BrokerError;

    #[test]
    fn records_are_kept_in_order() {
        let telemetry = RecordingTelemetry::new();
        telemetry.record_event(EventRecord::new("first"));
        telemetry.record_event(EventRecord::new("second"));
        telemetry.record_exception(&BrokerError::Connect("refused".into()));

        assert_eq!(telemetry.events_named("second").len(), 1);
        assert_eq!(telemetry.events()[0].name, "first");
        assert_eq!(telemetry.exceptions(), vec!["Connection failed: refused"]);

        telemetry.clear();
        assert!(telemetry.events().is_empty());
    }
}
