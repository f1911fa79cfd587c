//! Resolution of structured tokens for one request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use edge_core::{ComposeError, CompositionContext, PlaceholderKind, Token};
use edge_executor::{runtime_script, FetchEnv, Fragment, FragmentAttributes, FragmentOutcome, IndexCursor};
use edge_observability::{RequestEvent, RequestEventRecord};
use edge_streaming::{deferred_joiner, DeferredJoiner, JoinedStream, TagResolution, TagResolver};
use futures::channel::oneshot;
use futures::StreamExt;

/// Resolution for a custom handled tag.
///
/// Handlers see both the open and the close token of their tag.
pub trait TagHandler: Send + Sync {
    fn handle(
        &self,
        token: &Token,
        context: &CompositionContext,
    ) -> Result<TagResolution<CompositionContext>, ComposeError>;
}

/// Custom handlers keyed by tag name.
pub type TagHandlers = Arc<HashMap<String, Arc<dyn TagHandler>>>;

/// The first primary fragment of a request.
pub struct PrimaryFragment {
    pub id: String,
    pub outcome: oneshot::Receiver<FragmentOutcome>,
}

/// Turns the structured tokens of one request into content.
///
/// Fragments start fetching as soon as their tag is reached; indices are
/// handed out in the same order.
pub struct CompositionResolver {
    env: FetchEnv,
    handlers: TagHandlers,
    cursor: IndexCursor,
    joiner: DeferredJoiner,
    deferred: Option<JoinedStream>,
    runtime: Bytes,
    primary: Option<PrimaryFragment>,
    started: Instant,
}

impl CompositionResolver {
    /// Create a resolver for a request that started at `started`.
    pub fn new(env: FetchEnv, handlers: TagHandlers, started: Instant) -> Self {
        let (joiner, deferred) = deferred_joiner();
        let cursor = IndexCursor::new(env.config.index_width());
        let runtime = Bytes::from(runtime_script(&env.config.pipe_instance_name));
        Self {
            env,
            handlers,
            cursor,
            joiner,
            deferred: Some(deferred),
            runtime,
            primary: None,
            started,
        }
    }

    /// Number of async fragments found so far.
    pub fn deferred_fragments(&self) -> usize {
        self.joiner.pushed()
    }

    /// Close the deferred joiner and hand over the primary fragment.
    ///
    /// Fails if async fragments were found but the template had nowhere to
    /// put their content.
    pub fn finish(self) -> Result<Option<PrimaryFragment>, ComposeError> {
        let fragments = self.joiner.pushed();
        self.joiner.close();
        if fragments > 0 && self.deferred.is_some() {
            return Err(ComposeError::MissingDeferredPlaceholder { fragments });
        }
        Ok(self.primary)
    }

    fn open_fragment(
        &mut self,
        token: &Token,
        context: &CompositionContext,
    ) -> TagResolution<CompositionContext> {
        let attributes = FragmentAttributes::resolve(token, context, &self.env.config);
        let index = self.cursor.reserve();
        let id = attributes.id.clone();
        let primary = attributes.primary;

        self.env.sink.request(&RequestEventRecord {
            request_id: self.env.request_id.clone(),
            elapsed: self.started.elapsed(),
            event: RequestEvent::FragmentFound {
                id: id.clone(),
                index,
            },
        });

        let handle = Fragment::new(attributes, index).fetch(self.env.clone());

        if primary && self.primary.is_none() {
            self.primary = Some(PrimaryFragment {
                id,
                outcome: handle.outcome,
            });
        } else if primary {
            tracing::debug!(
                request_id = %self.env.request_id,
                fragment = %id,
                "Response head already follows an earlier primary fragment"
            );
        }

        if let Some(deferred) = handle.deferred {
            self.joiner.push(deferred);
        }
        TagResolution::Channel(handle.main)
    }
}

impl TagResolver for CompositionResolver {
    type Context = CompositionContext;

    fn resolve(
        &mut self,
        token: &Token,
        context: &CompositionContext,
    ) -> Result<Option<TagResolution<CompositionContext>>, ComposeError> {
        let config = Arc::clone(&self.env.config);
        let fragment_tag = config.fragment_tag.as_str();
        match token {
            Token::Placeholder(PlaceholderKind::Runtime) => {
                Ok(Some(TagResolution::Literal(self.runtime.clone())))
            }
            Token::Placeholder(PlaceholderKind::Deferred) => match self.deferred.take() {
                Some(stream) => Ok(Some(TagResolution::Channel(stream.boxed()))),
                None => Err(ComposeError::Resolver(
                    "deferred placeholder appears more than once".to_string(),
                )),
            },
            Token::OpenTag { name, .. } if name == fragment_tag => {
                Ok(Some(self.open_fragment(token, context)))
            }
            Token::CloseTag { name } if name == fragment_tag => Ok(Some(TagResolution::empty())),
            Token::OpenTag { name, .. } | Token::CloseTag { name } => {
                match self.handlers.get(name) {
                    Some(handler) => handler.handle(token, context).map(Some),
                    None => Ok(None),
                }
            }
            Token::Literal(bytes) => Ok(Some(TagResolution::Literal(bytes.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{Attribute, ComposeConfig, RequestId};
    use edge_data::{ClientConfig, HeaderFilter, UpstreamClient};
    use edge_observability::RecordingSink;
    use edge_streaming::compose;
    use http::HeaderMap;

    struct Upper;

    impl TagHandler for Upper {
        fn handle(
            &self,
            token: &Token,
            _context: &CompositionContext,
        ) -> Result<TagResolution<CompositionContext>, ComposeError> {
            Ok(match token {
                Token::OpenTag { .. } => TagResolution::Literal(Bytes::from_static(b"<B>")),
                _ => TagResolution::Literal(Bytes::from_static(b"</B>")),
            })
        }
    }

    fn resolver(handlers: TagHandlers, sink: Arc<RecordingSink>) -> CompositionResolver {
        let env = FetchEnv::new(
            UpstreamClient::new(&ClientConfig::default()).unwrap(),
            Arc::new(HeaderFilter::default()),
            Arc::new(HeaderMap::new()),
            Arc::new(ComposeConfig::default()),
            sink,
            RequestId::from_string("r1"),
        );
        CompositionResolver::new(env, handlers, Instant::now())
    }

    fn fragment(attrs: &[(&str, &str)]) -> Token {
        Token::OpenTag {
            name: "fragment".to_string(),
            attributes: attrs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect(),
            self_closing: true,
        }
    }

    async fn collect(stream: edge_streaming::ComposedStream) -> String {
        let chunks: Vec<_> = stream.collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_custom_handler_and_unknown_tag() {
        let mut handlers: HashMap<String, Arc<dyn TagHandler>> = HashMap::new();
        handlers.insert("upper".to_string(), Arc::new(Upper));
        let mut resolver = resolver(Arc::new(handlers), Arc::new(RecordingSink::new()));

        let tokens = vec![
            Token::OpenTag {
                name: "upper".to_string(),
                attributes: vec![],
                self_closing: false,
            },
            Token::literal("x"),
            Token::CloseTag {
                name: "upper".to_string(),
            },
        ];
        let stream = compose(&tokens, &mut resolver, CompositionContext::default()).unwrap();
        assert_eq!(collect(stream).await, "<B>x</B>");

        let unknown = vec![Token::CloseTag {
            name: "other".to_string(),
        }];
        let err = compose(&unknown, &mut resolver, CompositionContext::default())
            .err()
            .unwrap();
        assert!(matches!(err, ComposeError::UnhandledTag(name) if name == "other"));
    }

    #[tokio::test]
    async fn test_runtime_placeholder() {
        let mut resolver = resolver(TagHandlers::default(), Arc::new(RecordingSink::new()));
        let tokens = vec![Token::Placeholder(PlaceholderKind::Runtime)];
        let stream = compose(&tokens, &mut resolver, CompositionContext::default()).unwrap();
        let out = collect(stream).await;
        assert!(out.starts_with("<script data-pipe>"));
        assert!(out.ends_with(r#"(window, "Pipe");</script>"#));
    }

    #[tokio::test]
    async fn test_fragments_found_in_order_and_first_primary_kept() {
        let sink = Arc::new(RecordingSink::new());
        let mut resolver = resolver(TagHandlers::default(), sink.clone());
        let tokens = vec![
            fragment(&[("id", "a")]),
            fragment(&[("id", "b"), ("primary", "")]),
            fragment(&[("id", "c"), ("primary", "")]),
        ];
        let stream = compose(&tokens, &mut resolver, CompositionContext::default()).unwrap();

        let primary = resolver.finish().unwrap().unwrap();
        assert_eq!(primary.id, "b");

        let found: Vec<_> = sink
            .request_events()
            .into_iter()
            .filter_map(|r| match r.event {
                RequestEvent::FragmentFound { id, index } => Some((id, index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            found,
            vec![("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]
        );

        // No sources: every fragment fails and renders nothing.
        assert_eq!(collect(stream).await, "");
        assert!(primary.outcome.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_async_fragment_without_deferred_placeholder() {
        let mut resolver = resolver(TagHandlers::default(), Arc::new(RecordingSink::new()));
        let tokens = vec![fragment(&[("async", "")])];
        let _stream = compose(&tokens, &mut resolver, CompositionContext::default()).unwrap();
        assert_eq!(resolver.deferred_fragments(), 1);
        assert!(matches!(
            resolver.finish(),
            Err(ComposeError::MissingDeferredPlaceholder { fragments: 1 })
        ));
    }

    #[tokio::test]
    async fn test_second_deferred_placeholder_rejected() {
        let mut resolver = resolver(TagHandlers::default(), Arc::new(RecordingSink::new()));
        let tokens = vec![
            Token::Placeholder(PlaceholderKind::Deferred),
            Token::Placeholder(PlaceholderKind::Deferred),
        ];
        assert!(matches!(
            compose(&tokens, &mut resolver, CompositionContext::default()),
            Err(ComposeError::Resolver(_))
        ));
    }
}
