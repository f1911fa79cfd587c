//! Per-request orchestration.
//!
//! Context and template are retrieved concurrently. The template's tokens
//! are resolved in one pass, which starts every fragment fetch, and the
//! response head is held back until the primary fragment has answered.

use std::sync::Arc;

use bytes::Bytes;
use edge_core::{
    ComposeConfig, ComposeError, ComposePhase, CompositionContext, RequestId, ResponseHead,
    TimingContext,
};
use edge_data::{FetchError, HeaderFilter, UpstreamClient};
use edge_executor::FetchEnv;
use edge_observability::{
    EventSink, FanoutSink, MetricsRecorder, RequestEvent, RequestEventRecord, TracingSink,
};
use edge_streaming::{compose, BodyOutcome, InstrumentedBody};
use edge_template::{RenderMode, TemplateParser};
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::config::GatewayConfig;
use crate::resolver::{CompositionResolver, TagHandler, TagHandlers};
use crate::response::{document_head, failure_head, template_failure_body};
use crate::sources::{ContextSource, FileTemplateSource, NoContext, RequestInfo, TemplateSource};

/// Body of a composed response.
pub type ResponseBody = BoxStream<'static, Result<Bytes, ComposeError>>;

/// What to send back for one request.
pub struct ComposedResponse {
    pub head: ResponseHead,
    pub body: ResponseBody,
}

impl ComposedResponse {
    fn failure(request_id: &RequestId, body: Option<Bytes>) -> Self {
        let body = match body {
            Some(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            None => stream::empty().boxed(),
        };
        Self {
            head: failure_head(request_id),
            body,
        }
    }
}

struct Reporter {
    sink: Arc<dyn EventSink>,
    request_id: RequestId,
    timing: TimingContext,
}

impl Reporter {
    fn emit(&self, event: RequestEvent) {
        self.sink.request(&RequestEventRecord {
            request_id: self.request_id.clone(),
            elapsed: self.timing.elapsed(),
            event,
        });
    }

    fn phase(&self, phase: &ComposePhase) {
        tracing::trace!(request_id = %self.request_id, phase = ?phase, "Compose phase");
    }
}

/// Composes documents from templates and fragments.
///
/// Holds process-wide state only (the upstream pool, sources, handlers);
/// everything per request lives in `handle`.
pub struct RequestHandler {
    config: Arc<ComposeConfig>,
    parser: TemplateParser,
    client: UpstreamClient,
    headers: Arc<HeaderFilter>,
    templates: Arc<dyn TemplateSource>,
    contexts: Arc<dyn ContextSource>,
    handlers: TagHandlers,
    sink: Arc<dyn EventSink>,
}

impl RequestHandler {
    /// Create a handler with no context source, the default header filter
    /// and events logged through `tracing`.
    pub fn new(
        config: ComposeConfig,
        client: UpstreamClient,
        templates: Arc<dyn TemplateSource>,
    ) -> Self {
        Self {
            parser: TemplateParser::new(&config),
            config: Arc::new(config),
            client,
            headers: Arc::new(HeaderFilter::default()),
            templates,
            contexts: Arc::new(NoContext),
            handlers: TagHandlers::default(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Build a handler serving templates from the configured directory.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, FetchError> {
        let client = UpstreamClient::new(&config.upstream.client)?;
        let templates = Arc::new(FileTemplateSource::new(&config.templates));
        let sink = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(MetricsRecorder::default()));

        Ok(Self::new(config.compose.clone(), client, templates)
            .with_header_filter(config.upstream.header_filter())
            .with_sink(Arc::new(sink)))
    }

    pub fn with_context_source(mut self, contexts: Arc<dyn ContextSource>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn with_header_filter(mut self, headers: HeaderFilter) -> Self {
        self.headers = Arc::new(headers);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a handler for an additional tag.
    pub fn with_tag_handler(mut self, tag: impl Into<String>, handler: Arc<dyn TagHandler>) -> Self {
        let tag = tag.into().to_ascii_lowercase();
        let mut config = (*self.config).clone();
        if !config.handled_tags.contains(&tag) {
            config = config.with_handled_tag(tag.clone());
        }
        self.parser = TemplateParser::new(&config);
        self.config = Arc::new(config);
        Arc::make_mut(&mut self.handlers).insert(tag, handler);
        self
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Compose the response for one request.
    pub async fn handle(&self, request: RequestInfo, mode: RenderMode) -> ComposedResponse {
        let mut reporter = Reporter {
            sink: Arc::clone(&self.sink),
            request_id: request.request_id.clone(),
            timing: TimingContext::new(),
        };
        let request_id = request.request_id.clone();
        reporter.phase(&ComposePhase::Start);

        let (context, template) = tokio::join!(
            self.contexts.fetch(&request),
            self.templates.fetch(&request)
        );

        let mut context = context.unwrap_or_else(|err| {
            reporter.emit(RequestEvent::ContextFailed {
                error: err.to_string(),
            });
            CompositionContext::default()
        });
        if mode == RenderMode::Fragment {
            context = context.forcing_sync();
        }

        let template = match template {
            Ok(template) => template,
            Err(err) => {
                reporter.emit(RequestEvent::TemplateFailed {
                    error: err.to_string(),
                    not_found: err.is_not_found(),
                });
                reporter.phase(&ComposePhase::Error(err.to_string()));
                return ComposedResponse::failure(&request_id, Some(template_failure_body(&err)));
            }
        };

        let parsed = match self
            .parser
            .parse(&template.base, template.child.as_deref(), mode)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                reporter.emit(RequestEvent::TemplateFailed {
                    error: err.to_string(),
                    not_found: false,
                });
                reporter.phase(&ComposePhase::Error(err.to_string()));
                return ComposedResponse::failure(&request_id, Some(template_failure_body(&err)));
            }
        };
        for warning in &parsed.warnings {
            reporter.emit(RequestEvent::TemplateWarning {
                warning: warning.to_string(),
            });
        }

        reporter.phase(&ComposePhase::Composing);
        let env = FetchEnv::new(
            self.client.clone(),
            Arc::clone(&self.headers),
            Arc::new(request.headers),
            Arc::clone(&self.config),
            Arc::clone(&self.sink),
            request_id.clone(),
        );
        let mut resolver = CompositionResolver::new(
            env,
            Arc::clone(&self.handlers),
            reporter.timing.started_at(),
        );

        let composed = compose(&parsed.tokens, &mut resolver, context)
            .and_then(|composed| resolver.finish().map(|primary| (composed, primary)));
        let (composed, primary) = match composed {
            Ok(parts) => parts,
            Err(err) => return Self::abort(&reporter, err.to_string()),
        };

        let upstream_head = match primary {
            Some(primary) => match primary.outcome.await {
                Ok(Ok(head)) => Some(head),
                Ok(Err(err)) => {
                    return Self::abort(&reporter, format!("primary fragment {}: {err}", primary.id));
                }
                Err(_) => {
                    return Self::abort(
                        &reporter,
                        format!("primary fragment {} stopped without an outcome", primary.id),
                    );
                }
            },
            None => None,
        };

        let head = document_head(upstream_head.as_ref(), &self.config, &request_id);
        reporter.timing.mark("head_committed");
        tracing::debug!(
            request_id = %request_id,
            status = %head.status,
            time_to_head = ?reporter.timing.time_to_head(),
            "Response head committed"
        );
        reporter.phase(&ComposePhase::HeadCommitted);
        reporter.emit(RequestEvent::HeadCommitted { status: head.status });

        let body = InstrumentedBody::new(composed, move |outcome| match outcome {
            BodyOutcome::Completed { bytes } => {
                reporter.phase(&ComposePhase::Completion);
                reporter.emit(RequestEvent::Completed { bytes });
            }
            BodyOutcome::Failed { error, .. } => {
                reporter.phase(&ComposePhase::Error(error.clone()));
                reporter.emit(RequestEvent::Aborted { error });
            }
            BodyOutcome::Cancelled { bytes } => {
                reporter.emit(RequestEvent::Aborted {
                    error: format!("client went away after {bytes} bytes"),
                });
            }
        });

        ComposedResponse {
            head,
            body: body.boxed(),
        }
    }

    /// Fail before the head is sent. Whatever was composed so far is dropped.
    fn abort(reporter: &Reporter, error: String) -> ComposedResponse {
        reporter.phase(&ComposePhase::Error(error.clone()));
        reporter.emit(RequestEvent::Aborted { error });
        ComposedResponse::failure(&reporter.request_id, None)
    }
}
