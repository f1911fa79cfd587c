//! Fragment and request event records.
//!
//! Events are emitted as immutable records to an `EventSink`. Nothing in
//! the composition path depends on what a sink does with them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_core::RequestId;
use http::{HeaderMap, StatusCode};

/// Something that happened to one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentEvent {
    /// The upstream request was issued.
    Start,
    /// Response headers arrived.
    Response { status: StatusCode, headers: HeaderMap },
    /// The body finished streaming.
    End { bytes: u64 },
    /// The fragment failed and will render nothing.
    Error { error: String },
    /// The fallback source answered after the primary source failed.
    Fallback,
    /// The upstream did not answer in time.
    Timeout,
}

impl FragmentEvent {
    /// Short event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Response { .. } => "response",
            Self::End { .. } => "end",
            Self::Error { .. } => "error",
            Self::Fallback => "fallback",
            Self::Timeout => "timeout",
        }
    }
}

/// A fragment event with the fragment it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentEventRecord {
    pub request_id: RequestId,
    pub fragment_id: String,
    /// First index of the fragment's reserved range.
    pub index: usize,
    /// Source URL of the attempt that produced the event.
    pub url: String,
    pub primary: bool,
    /// Time since the fragment started.
    pub elapsed: Duration,
    pub event: FragmentEvent,
}

/// Something that happened to the request as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    /// Context retrieval failed; composition continues with an empty context.
    ContextFailed { error: String },
    /// Template retrieval failed; the request ends here.
    TemplateFailed { error: String, not_found: bool },
    /// The template was usable but had a problem.
    TemplateWarning { warning: String },
    /// A fragment tag was reached.
    FragmentFound { id: String, index: usize },
    /// Status and headers were sent.
    HeadCommitted { status: StatusCode },
    /// The body streamed to completion.
    Completed { bytes: u64 },
    /// The response ended early.
    Aborted { error: String },
}

/// A request event with its request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEventRecord {
    pub request_id: RequestId,
    /// Time since the request started.
    pub elapsed: Duration,
    pub event: RequestEvent,
}

/// Receives event records.
pub trait EventSink: Send + Sync {
    /// Handle a fragment event.
    fn fragment(&self, record: &FragmentEventRecord);

    /// Handle a request event.
    fn request(&self, record: &RequestEventRecord);
}

/// Writes every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn fragment(&self, record: &FragmentEventRecord) {
        let elapsed_ms = record.elapsed.as_millis() as u64;
        match &record.event {
            FragmentEvent::Start => tracing::debug!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                index = record.index,
                url = %record.url,
                "Fragment started"
            ),
            FragmentEvent::Response { status, .. } => tracing::debug!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                status = status.as_u16(),
                elapsed_ms,
                "Fragment responded"
            ),
            FragmentEvent::End { bytes } => tracing::debug!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                bytes,
                elapsed_ms,
                "Fragment ended"
            ),
            FragmentEvent::Error { error } => tracing::warn!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                url = %record.url,
                primary = record.primary,
                error = %error,
                "Fragment failed"
            ),
            FragmentEvent::Fallback => tracing::info!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                url = %record.url,
                "Fragment served from fallback"
            ),
            FragmentEvent::Timeout => tracing::warn!(
                request_id = %record.request_id,
                fragment = %record.fragment_id,
                url = %record.url,
                elapsed_ms,
                "Fragment timed out"
            ),
        }
    }

    fn request(&self, record: &RequestEventRecord) {
        let elapsed_ms = record.elapsed.as_millis() as u64;
        match &record.event {
            RequestEvent::ContextFailed { error } => tracing::warn!(
                request_id = %record.request_id,
                error = %error,
                "Context unavailable, using empty context"
            ),
            RequestEvent::TemplateFailed { error, not_found } => tracing::error!(
                request_id = %record.request_id,
                error = %error,
                not_found,
                "Template unavailable"
            ),
            RequestEvent::TemplateWarning { warning } => tracing::warn!(
                request_id = %record.request_id,
                warning = %warning,
                "Template warning"
            ),
            RequestEvent::FragmentFound { id, index } => tracing::trace!(
                request_id = %record.request_id,
                fragment = %id,
                index,
                "Fragment found"
            ),
            RequestEvent::HeadCommitted { status } => tracing::debug!(
                request_id = %record.request_id,
                status = status.as_u16(),
                elapsed_ms,
                "Head committed"
            ),
            RequestEvent::Completed { bytes } => tracing::info!(
                request_id = %record.request_id,
                bytes,
                elapsed_ms,
                "Response completed"
            ),
            RequestEvent::Aborted { error } => tracing::error!(
                request_id = %record.request_id,
                error = %error,
                elapsed_ms,
                "Response aborted"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    fragments: Mutex<Vec<FragmentEventRecord>>,
    requests: Mutex<Vec<RequestEventRecord>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment events received so far.
    pub fn fragment_events(&self) -> Vec<FragmentEventRecord> {
        self.fragments
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Request events received so far.
    pub fn request_events(&self) -> Vec<RequestEventRecord> {
        self.requests
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of the events received for one fragment, in order.
    pub fn events_for(&self, fragment_id: &str) -> Vec<&'static str> {
        self.fragment_events()
            .iter()
            .filter(|r| r.fragment_id == fragment_id)
            .map(|r| r.event.name())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn fragment(&self, record: &FragmentEventRecord) {
        if let Ok(mut events) = self.fragments.lock() {
            events.push(record.clone());
        }
    }

    fn request(&self, record: &RequestEventRecord) {
        if let Ok(mut events) = self.requests.lock() {
            events.push(record.clone());
        }
    }
}

/// Forwards every event to several sinks.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Create an empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn fragment(&self, record: &FragmentEventRecord) {
        for sink in &self.sinks {
            sink.fragment(record);
        }
    }

    fn request(&self, record: &RequestEventRecord) {
        for sink in &self.sinks {
            sink.request(record);
        }
    }
}
