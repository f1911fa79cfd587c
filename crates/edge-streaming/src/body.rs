//! Response body with completion accounting.

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};

/// How a response body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyOutcome {
    /// Every chunk was delivered.
    Completed { bytes: u64 },
    /// The stream produced an error after `bytes` were delivered.
    Failed { bytes: u64, error: String },
    /// The body was dropped before it ended, usually a client disconnect.
    Cancelled { bytes: u64 },
}

impl BodyOutcome {
    /// Bytes delivered before the body ended.
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes } | Self::Failed { bytes, .. } | Self::Cancelled { bytes } => {
                *bytes
            }
        }
    }
}

type FinishCallback = Box<dyn FnOnce(BodyOutcome) + Send>;

/// Wraps a body stream, counting bytes and reporting exactly one outcome.
pub struct InstrumentedBody<S> {
    inner: S,
    bytes: u64,
    on_finish: Option<FinishCallback>,
}

impl<S> InstrumentedBody<S> {
    /// Wrap `inner`; `on_finish` runs once when the body ends or is dropped.
    pub fn new(inner: S, on_finish: impl FnOnce(BodyOutcome) + Send + 'static) -> Self {
        Self {
            inner,
            bytes: 0,
            on_finish: Some(Box::new(on_finish)),
        }
    }

    fn finish(&mut self, outcome: BodyOutcome) {
        if let Some(callback) = self.on_finish.take() {
            callback(outcome);
        }
    }
}

impl<S, E> Stream for InstrumentedBody<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.on_finish.is_none() {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                let outcome = BodyOutcome::Failed {
                    bytes: this.bytes,
                    error: err.to_string(),
                };
                this.finish(outcome);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                let outcome = BodyOutcome::Completed { bytes: this.bytes };
                this.finish(outcome);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for InstrumentedBody<S> {
    fn drop(&mut self) {
        let outcome = BodyOutcome::Cancelled { bytes: self.bytes };
        self.finish(outcome);
    }
}
