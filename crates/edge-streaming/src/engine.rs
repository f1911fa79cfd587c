//! Ordered composition of literal markup and content channels.
//!
//! Every structured token is resolved as soon as it is reached, so all
//! channels start producing immediately. Output order is still the token
//! order: a channel's bytes are held back until everything queued before it
//! has been emitted.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use edge_core::{ComposeError, Token};
use futures::Stream;

use crate::channel::{ChannelSlot, ContentChannel};

/// What a resolver produced for a structured token.
pub enum TagResolution<C> {
    /// Markup known immediately.
    Literal(Bytes),
    /// Markup produced asynchronously.
    Channel(ContentChannel),
    /// Markup produced asynchronously; later tokens see the new context.
    ChannelWithContextUpdate(ContentChannel, C),
}

impl<C> TagResolution<C> {
    /// An empty literal.
    pub fn empty() -> Self {
        Self::Literal(Bytes::new())
    }
}

/// Resolves structured tokens for the composition engine.
pub trait TagResolver {
    /// Request-scoped context passed to every resolution.
    type Context;

    /// Resolve one structured token.
    ///
    /// Called synchronously, in token order. `Ok(None)` means the token is
    /// not handled, which aborts the composition.
    fn resolve(
        &mut self,
        token: &Token,
        context: &Self::Context,
    ) -> Result<Option<TagResolution<Self::Context>>, ComposeError>;
}

/// Walk the tokens, resolving each structured one, and return the ordered
/// output stream.
pub fn compose<R: TagResolver>(
    tokens: &[Token],
    resolver: &mut R,
    mut context: R::Context,
) -> Result<ComposedStream, ComposeError> {
    let mut output = ComposedStream::new();

    for token in tokens {
        if let Token::Literal(bytes) = token {
            output.push_literal(bytes.clone());
            continue;
        }

        let resolution = resolver.resolve(token, &context)?.ok_or_else(|| {
            let name = match token {
                Token::Placeholder(kind) => kind.name().to_string(),
                other => other.tag_name().unwrap_or_default().to_string(),
            };
            ComposeError::UnhandledTag(name)
        })?;

        match resolution {
            TagResolution::Literal(bytes) => output.push_literal(bytes),
            TagResolution::Channel(channel) => output.push_channel(channel),
            TagResolution::ChannelWithContextUpdate(channel, next) => {
                output.push_channel(channel);
                context = next;
            }
        }
    }

    Ok(output)
}

enum Entry {
    Literal(Bytes),
    Channel(ChannelSlot),
}

/// Strict-order merge of literals and concurrently producing channels.
///
/// The front entry is "current": its chunks stream straight through.
/// Channels behind it are drained into their own buffers on every poll and
/// flushed as one chunk when they reach the front.
pub struct ComposedStream {
    queue: VecDeque<Entry>,
    failed: bool,
}

impl ComposedStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            failed: false,
        }
    }

    /// Queue literal markup.
    pub fn push_literal(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        // Adjacent literals are merged.
        if let Some(Entry::Literal(last)) = self.queue.back_mut() {
            let mut joined = Vec::with_capacity(last.len() + bytes.len());
            joined.extend_from_slice(last);
            joined.extend_from_slice(&bytes);
            *last = Bytes::from(joined);
            return;
        }
        self.queue.push_back(Entry::Literal(bytes));
    }

    /// Queue a channel.
    pub fn push_channel(&mut self, channel: ContentChannel) {
        self.queue.push_back(Entry::Channel(ChannelSlot::new(channel)));
    }

    /// Number of entries not yet fully emitted.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn fail(&mut self, error: ComposeError) -> Poll<Option<Result<Bytes, ComposeError>>> {
        tracing::debug!(error = %error, pending = self.queue.len(), "Composition aborted");
        self.failed = true;
        self.queue.clear();
        Poll::Ready(Some(Err(error)))
    }
}

impl Default for ComposedStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ComposedStream {
    type Item = Result<Bytes, ComposeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }

        let mut error = None;
        for entry in this.queue.iter_mut().skip(1) {
            if let Entry::Channel(slot) = entry {
                if let Err(err) = slot.drain_ready(cx) {
                    error = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = error {
            return this.fail(err);
        }

        loop {
            let Some(front) = this.queue.front_mut() else {
                return Poll::Ready(None);
            };

            match front {
                Entry::Literal(bytes) => {
                    let bytes = std::mem::take(bytes);
                    this.queue.pop_front();
                    return Poll::Ready(Some(Ok(bytes)));
                }
                Entry::Channel(slot) => {
                    if let Some(buffered) = slot.take_buffer() {
                        return Poll::Ready(Some(Ok(buffered)));
                    }
                    match slot.poll_chunk(cx) {
                        Poll::Ready(Some(Ok(chunk))) if chunk.is_empty() => continue,
                        Poll::Ready(Some(Ok(chunk))) => return Poll::Ready(Some(Ok(chunk))),
                        Poll::Ready(Some(Err(err))) => return this.fail(err),
                        Poll::Ready(None) => {
                            this.queue.pop_front();
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{content_channel, literal_channel};
    use edge_core::{Attribute, PlaceholderKind};
    use futures::StreamExt;
    use std::time::Duration;

    fn fragment(src: &str) -> Token {
        Token::OpenTag {
            name: "fragment".to_string(),
            attributes: vec![Attribute::new("src", src)],
            self_closing: false,
        }
    }

    fn close() -> Token {
        Token::CloseTag {
            name: "fragment".to_string(),
        }
    }

    async fn collect(stream: ComposedStream) -> Result<String, ComposeError> {
        let chunks: Vec<Result<Bytes, ComposeError>> = stream.collect().await;
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(std::str::from_utf8(&chunk?).unwrap());
        }
        Ok(out)
    }

    /// Resolves each fragment to a channel that completes after `src` ms.
    struct DelayedResolver {
        discovered: Vec<String>,
    }

    impl TagResolver for DelayedResolver {
        type Context = ();

        fn resolve(
            &mut self,
            token: &Token,
            _context: &(),
        ) -> Result<Option<TagResolution<()>>, ComposeError> {
            match token {
                Token::OpenTag { .. } => {
                    let src = token.attribute("src").unwrap_or_default().to_string();
                    self.discovered.push(src.clone());
                    let delay: u64 = src.trim_start_matches('f').parse().unwrap();
                    let (writer, channel) = content_channel();
                    tokio::spawn(async move {
                        writer.write_str(&format!("<{}", src));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        writer.write_str(">");
                    });
                    Ok(Some(TagResolution::Channel(channel)))
                }
                Token::CloseTag { .. } => Ok(Some(TagResolution::empty())),
                _ => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_output_follows_token_order() {
        let tokens = vec![
            Token::literal("["),
            fragment("f50"),
            close(),
            fragment("f20"),
            close(),
            fragment("f5"),
            close(),
            Token::literal("]"),
        ];
        let mut resolver = DelayedResolver {
            discovered: Vec::new(),
        };

        let stream = compose(&tokens, &mut resolver, ()).unwrap();
        assert_eq!(resolver.discovered, vec!["f50", "f20", "f5"]);
        assert_eq!(collect(stream).await.unwrap(), "[<f50><f20><f5>]");
    }

    #[tokio::test]
    async fn test_unhandled_token_is_an_error() {
        let tokens = vec![Token::Placeholder(PlaceholderKind::Deferred)];
        let mut resolver = DelayedResolver {
            discovered: Vec::new(),
        };

        let err = compose(&tokens, &mut resolver, ()).err().unwrap();
        assert!(matches!(err, ComposeError::UnhandledTag(name) if name == "deferred"));
    }

    struct FailingResolver;

    impl TagResolver for FailingResolver {
        type Context = ();

        fn resolve(
            &mut self,
            _token: &Token,
            _context: &(),
        ) -> Result<Option<TagResolution<()>>, ComposeError> {
            Err(ComposeError::Resolver("boom".to_string()))
        }
    }

    #[test]
    fn test_resolver_error_propagates() {
        let tokens = vec![Token::literal("a"), fragment("x")];
        let err = compose(&tokens, &mut FailingResolver, ()).err().unwrap();
        assert!(matches!(err, ComposeError::Resolver(_)));
    }

    #[tokio::test]
    async fn test_channel_error_stops_stream() {
        let mut stream = ComposedStream::new();
        stream.push_literal(Bytes::from("a"));
        let (writer, channel) = content_channel();
        stream.push_channel(channel);
        stream.push_literal(Bytes::from("never"));

        writer.write_str("b");
        writer.fail(ComposeError::Stream("upstream reset".to_string()));

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &Bytes::from("a"));
        assert_eq!(items[1].as_ref().unwrap(), &Bytes::from("b"));
        assert!(items[2].is_err());
    }

    #[tokio::test]
    async fn test_error_in_later_channel_aborts_early() {
        let mut stream = ComposedStream::new();
        let (slow, slow_channel) = content_channel();
        stream.push_channel(slow_channel);
        let (fast, fast_channel) = content_channel();
        stream.push_channel(fast_channel);

        fast.fail(ComposeError::Stream("bad".to_string()));
        let first = stream.next().await.unwrap();
        assert!(first.is_err());
        assert!(stream.next().await.is_none());
        assert!(!slow.write_str("late"));
    }

    #[tokio::test]
    async fn test_buffered_channel_flushed_as_one_chunk() {
        let mut stream = ComposedStream::new();
        let (first, first_channel) = content_channel();
        stream.push_channel(first_channel);
        let (second, second_channel) = content_channel();
        stream.push_channel(second_channel);

        second.write_str("x");
        second.write_str("y");
        drop(second);
        first.write_str("a");
        drop(first);

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("xy")]);
    }

    struct ContextResolver;

    impl TagResolver for ContextResolver {
        type Context = u32;

        fn resolve(
            &mut self,
            _token: &Token,
            context: &u32,
        ) -> Result<Option<TagResolution<u32>>, ComposeError> {
            let channel = literal_channel(context.to_string());
            Ok(Some(TagResolution::ChannelWithContextUpdate(channel, context + 1)))
        }
    }

    #[tokio::test]
    async fn test_context_update_applies_to_later_tokens() {
        let tokens = vec![fragment("a"), fragment("b"), fragment("c")];
        let stream = compose(&tokens, &mut ContextResolver, 7).unwrap();
        assert_eq!(collect(stream).await.unwrap(), "789");
    }

    #[test]
    fn test_adjacent_literals_merged() {
        let mut stream = ComposedStream::new();
        stream.push_literal(Bytes::from("a"));
        stream.push_literal(Bytes::from("b"));
        stream.push_literal(Bytes::new());
        assert_eq!(stream.pending(), 1);
    }
}
