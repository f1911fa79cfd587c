//! Observability for the composition gateway.
//!
//! This crate provides:
//! - `EventSink` - Receiver for fragment and request event records
//! - `TracingSink` / `RecordingSink` / `FanoutSink` - Built-in sinks
//! - `MetricsRecorder` - Per-request timing and fragment metrics
//! - `init_logging` - Structured logging setup

mod events;
mod logging;
mod metrics;

pub use events::*;
pub use logging::*;
pub use metrics::*;

// Re-export RequestId and TimingContext from edge-core for convenience
pub use edge_core::{RequestId, TimingContext};
