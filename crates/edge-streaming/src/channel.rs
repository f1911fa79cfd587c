//! Content channels.

use bytes::{Bytes, BytesMut};
use edge_core::ComposeError;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::task::{Context, Poll};

/// A stream of markup produced asynchronously for one placeholder.
pub type ContentChannel = BoxStream<'static, Result<Bytes, ComposeError>>;

/// Writing half of a content channel.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<Result<Bytes, ComposeError>>,
}

/// Create a connected writer and channel.
pub fn content_channel() -> (ChannelWriter, ContentChannel) {
    let (tx, rx) = mpsc::unbounded();
    (ChannelWriter { tx }, rx.boxed())
}

/// A channel that yields one chunk and ends.
pub fn literal_channel(bytes: impl Into<Bytes>) -> ContentChannel {
    stream::once(futures::future::ready(Ok(bytes.into()))).boxed()
}

impl ChannelWriter {
    /// Write a chunk. Returns false once the reading side is gone.
    pub fn write(&self, bytes: impl Into<Bytes>) -> bool {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.unbounded_send(Ok(bytes)).is_ok()
    }

    /// Write a string chunk.
    pub fn write_str(&self, text: &str) -> bool {
        self.write(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Signal an error and end the channel.
    pub fn fail(self, error: ComposeError) {
        let _ = self.tx.unbounded_send(Err(error));
    }

    /// Check if the reading side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One queued channel plus whatever it has produced so far.
pub(crate) struct ChannelSlot {
    stream: Option<ContentChannel>,
    buffer: Vec<Bytes>,
}

impl ChannelSlot {
    pub(crate) fn new(stream: ContentChannel) -> Self {
        Self {
            stream: Some(stream),
            buffer: Vec::new(),
        }
    }

    /// Move every chunk that is ready into the buffer.
    pub(crate) fn drain_ready(&mut self, cx: &mut Context<'_>) -> Result<(), ComposeError> {
        while let Some(stream) = self.stream.as_mut() {
            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if !chunk.is_empty() {
                        self.buffer.push(chunk);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    self.stream = None;
                    return Err(err);
                }
                Poll::Ready(None) => self.stream = None,
                Poll::Pending => break,
            }
        }
        Ok(())
    }

    /// Poll the underlying channel directly.
    pub(crate) fn poll_chunk(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, ComposeError>>> {
        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = stream.poll_next_unpin(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.stream = None;
        }
        polled
    }

    /// Check if the channel has ended.
    pub(crate) fn is_finished(&self) -> bool {
        self.stream.is_none()
    }

    /// Take everything buffered so far as one chunk.
    pub(crate) fn take_buffer(&mut self) -> Option<Bytes> {
        match self.buffer.len() {
            0 => None,
            1 => self.buffer.pop(),
            _ => {
                let total = self.buffer.iter().map(Bytes::len).sum();
                let mut joined = BytesMut::with_capacity(total);
                for chunk in self.buffer.drain(..) {
                    joined.extend_from_slice(&chunk);
                }
                Some(joined.freeze())
            }
        }
    }
}
