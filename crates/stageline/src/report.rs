//! Run reporting.
//!
//! Stages that need to report progress receive a [`Reporter`] explicitly
//! instead of reaching for a global logger. A reporter lives for one run.

use std::sync::Mutex;

use serde_json::{Map, Value};

/// Structured event sink.
pub trait Reporter {
    /// Record one event with its fields.
    fn record(&self, event: &str, fields: &[(&str, Value)]);
}

/// Forwards events to `tracing`.
///
/// Events whose name ends in `_failed` or `_rolled_back` are emitted at
/// warn level; everything else at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    /// Create a tracing-backed reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for TracingReporter {
    fn record(&self, event: &str, fields: &[(&str, Value)]) {
        let rendered = render_fields(fields);
        if event.ends_with("_failed") || event.ends_with("_rolled_back") {
            tracing::warn!(target: "stageline", event, "{}", rendered);
        } else {
            tracing::info!(target: "stageline", event, "{}", rendered);
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn record(&self, _event: &str, _fields: &[(&str, Value)]) {}
}

/// One captured event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedEvent {
    pub event: String,
    pub fields: Map<String, Value>,
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportedEvent>>,
}

impl MemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events with the given name.
    pub fn named(&self, event: &str) -> Vec<ReportedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn record(&self, event: &str, fields: &[(&str, Value)]) {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if let Ok(mut events) = self.events.lock() {
            events.push(ReportedEvent {
                event: event.to_string(),
                fields,
            });
        }
    }
}

/// Render fields as `key=value` pairs.
fn render_fields(fields: &[(&str, Value)]) -> String {
    fields
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
