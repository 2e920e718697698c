//! Telemetry sink abstraction.
//!
//! Pipeline components never talk to a concrete telemetry backend. They receive
//! an `Arc<dyn Telemetry>` and emit four kinds of records:
//!
//! - **Events**: business milestones (`CaptureOrder to MongoDB`, ...), with a
//!   `sequence` property that orders the steps of one workflow.
//! - **Dependencies**: one record per call to an external system.
//! - **Exceptions**: failures worth surfacing even when they are handled.
//! - **Requests**: one record per ingestion request.
//!
//! Recording is synchronous and infallible: a sink that cannot deliver a record
//! drops it rather than failing the pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

/// Service name attached to every business event.
pub const SERVICE_NAME: &str = "CaptureOrder";

/// A named business event with string properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Event name
    pub name: String,
    /// Event properties
    pub properties: BTreeMap<String, String>,
}

impl EventRecord {
    /// Create an event with no properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// One call to an external system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRecord {
    /// Dependency name (`MongoDB`, `CosmosDB`, `ServiceBus`)
    pub name: String,
    /// Dependency type (`MongoDB`, `AMQP`)
    pub dependency_type: String,
    /// Target host or endpoint, without credentials
    pub target: String,
    /// Operation performed (`Insert order`, `Send message`, ...)
    pub data: String,
    /// Whether the call succeeded
    pub success: bool,
    /// Wall-clock duration of the call
    pub duration: Duration,
    /// Error text when the call failed
    pub result_code: Option<String>,
}

/// One ingestion request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestRecord {
    /// Request name
    pub name: String,
    /// HTTP method
    pub method: String,
    /// Logical route
    pub url: String,
    /// Wall-clock duration
    pub duration: Duration,
    /// Response code reported for the request (`200` / `500`)
    pub response_code: String,
    /// Extra properties
    pub properties: BTreeMap<String, String>,
}

impl RequestRecord {
    /// Whether the request was reported as successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_code == "200"
    }
}

/// Injected telemetry capability.
pub trait Telemetry: Send + Sync {
    /// Record a business event.
    fn record_event(&self, event: EventRecord);

    /// Record a call to an external system.
    fn record_dependency(&self, dependency: DependencyRecord);

    /// Record a handled or unhandled failure.
    fn record_exception(&self, error: &(dyn std::error::Error + 'static));

    /// Record a completed request.
    fn record_request(&self, request: RequestRecord);
}

/// Sink that drops every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_event(&self, _event: EventRecord) {}

    fn record_dependency(&self, _dependency: DependencyRecord) {}

    fn record_exception(&self, _error: &(dyn std::error::Error + 'static)) {}

    fn record_request(&self, _request: RequestRecord) {}
}
