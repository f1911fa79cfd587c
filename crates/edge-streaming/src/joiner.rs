//! Deferred-content joiner.
//!
//! Collects the deferred channel of every async fragment and emits each
//! one's markup whole, in the order the channels were pushed.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use edge_core::ComposeError;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};

use crate::channel::{ChannelSlot, ContentChannel};

enum JoinerMessage {
    Channel(ContentChannel),
    Close,
}

/// Feeding half of the joiner.
///
/// Dropping it has the same effect as `close`.
pub struct DeferredJoiner {
    tx: mpsc::UnboundedSender<JoinerMessage>,
    pushed: usize,
}

/// Create a connected joiner and its output stream.
pub fn deferred_joiner() -> (DeferredJoiner, JoinedStream) {
    let (tx, rx) = mpsc::unbounded();
    (
        DeferredJoiner { tx, pushed: 0 },
        JoinedStream {
            rx: Some(rx),
            queue: VecDeque::new(),
            closed: false,
            failed: false,
        },
    )
}

impl DeferredJoiner {
    /// Queue a deferred channel behind those already pushed.
    pub fn push(&mut self, channel: ContentChannel) {
        self.pushed += 1;
        if self.tx.unbounded_send(JoinerMessage::Channel(channel)).is_err() {
            tracing::debug!("Deferred output already dropped, discarding channel");
        }
    }

    /// Signal that no more channels are expected.
    ///
    /// Channels pushed afterwards are still emitted.
    pub fn close(&self) {
        let _ = self.tx.unbounded_send(JoinerMessage::Close);
    }

    /// Number of channels pushed so far.
    pub fn pushed(&self) -> usize {
        self.pushed
    }
}

/// Output of the deferred joiner.
pub struct JoinedStream {
    rx: Option<mpsc::UnboundedReceiver<JoinerMessage>>,
    queue: VecDeque<ChannelSlot>,
    closed: bool,
    failed: bool,
}

impl JoinedStream {
    fn receive(&mut self, cx: &mut Context<'_>) {
        while let Some(rx) = self.rx.as_mut() {
            match rx.poll_next_unpin(cx) {
                Poll::Ready(Some(JoinerMessage::Channel(channel))) => {
                    self.queue.push_back(ChannelSlot::new(channel));
                }
                Poll::Ready(Some(JoinerMessage::Close)) => self.closed = true,
                Poll::Ready(None) => {
                    self.closed = true;
                    self.rx = None;
                }
                Poll::Pending => break,
            }
        }
    }
}

impl Stream for JoinedStream {
    type Item = Result<Bytes, ComposeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }

        this.receive(cx);

        let mut error = None;
        for slot in this.queue.iter_mut() {
            if let Err(err) = slot.drain_ready(cx) {
                error = Some(err);
                break;
            }
        }
        if let Some(err) = error {
            this.failed = true;
            this.queue.clear();
            this.rx = None;
            return Poll::Ready(Some(Err(err)));
        }

        while let Some(front) = this.queue.front_mut() {
            if !front.is_finished() {
                return Poll::Pending;
            }
            let buffered = front.take_buffer();
            this.queue.pop_front();
            if let Some(bytes) = buffered {
                return Poll::Ready(Some(Ok(bytes)));
            }
        }

        if this.closed {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{content_channel, literal_channel};
    use std::time::Duration;

    fn delayed(parts: &'static [&'static str], delay_ms: u64) -> ContentChannel {
        let (writer, channel) = content_channel();
        tokio::spawn(async move {
            for part in parts {
                writer.write_str(part);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        });
        channel
    }

    #[tokio::test]
    async fn test_emits_in_push_order() {
        let (mut joiner, stream) = deferred_joiner();
        joiner.push(delayed(&["<a1", "a2>"], 30));
        joiner.push(delayed(&["<b1", "b2>"], 5));
        joiner.close();

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("<a1a2>"), Bytes::from("<b1b2>")]);
        assert_eq!(joiner.pushed(), 2);
    }

    #[tokio::test]
    async fn test_accepts_channels_after_close() {
        let (mut joiner, stream) = deferred_joiner();
        joiner.push(literal_channel("one"));
        joiner.close();
        joiner.push(literal_channel("two"));
        drop(joiner);

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("one"), Bytes::from("two")]);
    }

    #[tokio::test]
    async fn test_empty_joiner_ends_on_close() {
        let (joiner, stream) = deferred_joiner();
        joiner.close();
        let chunks: Vec<_> = stream.collect().await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_empty_channels_emit_nothing() {
        let (mut joiner, stream) = deferred_joiner();
        let (writer, channel) = content_channel();
        joiner.push(channel);
        joiner.push(literal_channel("x"));
        drop(writer);
        drop(joiner);

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("x")]);
    }

    #[tokio::test]
    async fn test_channel_error_ends_output() {
        let (mut joiner, mut stream) = deferred_joiner();
        let (writer, channel) = content_channel();
        joiner.push(channel);
        joiner.close();
        writer.fail(ComposeError::Stream("reset".to_string()));

        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
