//! Per-request composition metrics.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::events::{
    EventSink, FragmentEvent, FragmentEventRecord, RequestEvent, RequestEventRecord,
};

/// Metrics for a single composed request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Time to committed head (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_head_us: Option<u64>,
    /// Total request duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_us: Option<u64>,
    /// HTTP status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Body bytes delivered.
    pub bytes: u64,
    /// Fragments in discovery order.
    pub fragments: Vec<FragmentMetrics>,
    /// Error that ended the request early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metrics for a single fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FragmentMetrics {
    /// Fragment id.
    pub id: String,
    /// URL of the last attempt.
    pub url: String,
    /// Time from fragment start to end or failure (microseconds).
    pub duration_us: u64,
    /// Upstream status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Body bytes.
    pub bytes: u64,
    /// Whether the fallback source was used.
    pub used_fallback: bool,
    /// Whether an attempt timed out.
    pub timed_out: bool,
    /// Error message if the fragment failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestMetrics {
    fn fragment_mut(&mut self, id: &str) -> &mut FragmentMetrics {
        let position = match self.fragments.iter().position(|f| f.id == id) {
            Some(position) => position,
            None => {
                self.fragments.push(FragmentMetrics {
                    id: id.to_string(),
                    ..FragmentMetrics::default()
                });
                self.fragments.len() - 1
            }
        };
        &mut self.fragments[position]
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Request: {} [{}]",
            self.request_id,
            self.status_code.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
        ));

        if let Some(tth) = self.time_to_head_us {
            lines.push(format!("  Time to head: {}us ({:.2}ms)", tth, tth as f64 / 1000.0));
        }

        if let Some(total) = self.total_duration_us {
            lines.push(format!(
                "  Total: {}us ({:.2}ms), {} bytes",
                total,
                total as f64 / 1000.0,
                self.bytes
            ));
        }

        if !self.fragments.is_empty() {
            lines.push("  Fragments:".to_string());
            for fragment in &self.fragments {
                let status = match (&fragment.error, fragment.status_code) {
                    (Some(_), _) => "FAILED".to_string(),
                    (None, Some(code)) => code.to_string(),
                    (None, None) => "-".to_string(),
                };
                let fallback = if fragment.used_fallback { " [fallback]" } else { "" };
                let timeout = if fragment.timed_out { " [timeout]" } else { "" };
                lines.push(format!(
                    "    {} [{}]: {}us ({:.2}ms){}{} - {}",
                    fragment.id,
                    status,
                    fragment.duration_us,
                    fragment.duration_us as f64 / 1000.0,
                    fallback,
                    timeout,
                    fragment.url
                ));
            }
        }

        lines.join("\n")
    }
}

/// Aggregates events into `RequestMetrics`.
///
/// A request's metrics are finalized on `Completed`, `Aborted` or
/// `TemplateFailed` and logged at debug level; the most recent ones are kept.
#[derive(Debug)]
pub struct MetricsRecorder {
    active: Mutex<HashMap<String, RequestMetrics>>,
    finished: Mutex<VecDeque<RequestMetrics>>,
    keep: usize,
}

impl MetricsRecorder {
    /// Create a recorder keeping the last `keep` finished requests.
    pub fn new(keep: usize) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            keep,
        }
    }

    /// Finished requests, oldest first.
    pub fn recent(&self) -> Vec<RequestMetrics> {
        self.finished
            .lock()
            .map(|finished| finished.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn finish(&self, metrics: RequestMetrics) {
        tracing::debug!(
            request_id = %metrics.request_id,
            metrics = %metrics.to_json(),
            "Request metrics"
        );
        if self.keep == 0 {
            return;
        }
        if let Ok(mut finished) = self.finished.lock() {
            while finished.len() >= self.keep {
                finished.pop_front();
            }
            finished.push_back(metrics);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EventSink for MetricsRecorder {
    fn fragment(&self, record: &FragmentEventRecord) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        // Fetches can outlive their request; their late events are dropped.
        let Some(request) = active.get_mut(record.request_id.as_str()) else {
            return;
        };

        let fragment = request.fragment_mut(&record.fragment_id);
        fragment.url = record.url.clone();
        match &record.event {
            FragmentEvent::Start => {}
            FragmentEvent::Response { status, .. } => fragment.status_code = Some(status.as_u16()),
            FragmentEvent::End { bytes } => {
                fragment.bytes = *bytes;
                fragment.duration_us = record.elapsed.as_micros() as u64;
            }
            FragmentEvent::Error { error } => {
                fragment.error = Some(error.clone());
                fragment.duration_us = record.elapsed.as_micros() as u64;
            }
            FragmentEvent::Fallback => fragment.used_fallback = true,
            FragmentEvent::Timeout => fragment.timed_out = true,
        }
    }

    fn request(&self, record: &RequestEventRecord) {
        let finished = {
            let Ok(mut active) = self.active.lock() else {
                return;
            };
            let key = record.request_id.to_string();
            let request = active.entry(key.clone()).or_insert_with(|| RequestMetrics {
                request_id: key.clone(),
                ..RequestMetrics::default()
            });

            let done = match &record.event {
                RequestEvent::FragmentFound { id, .. } => {
                    request.fragment_mut(id);
                    false
                }
                RequestEvent::HeadCommitted { status } => {
                    request.status_code = Some(status.as_u16());
                    request.time_to_head_us = Some(record.elapsed.as_micros() as u64);
                    false
                }
                RequestEvent::Completed { bytes } => {
                    request.bytes = *bytes;
                    true
                }
                RequestEvent::Aborted { error } | RequestEvent::TemplateFailed { error, .. } => {
                    request.error = Some(error.clone());
                    true
                }
                RequestEvent::ContextFailed { .. } | RequestEvent::TemplateWarning { .. } => false,
            };

            if done {
                request.total_duration_us = Some(record.elapsed.as_micros() as u64);
                active.remove(&key)
            } else {
                None
            }
        };

        if let Some(metrics) = finished {
            self.finish(metrics);
        }
    }
}
