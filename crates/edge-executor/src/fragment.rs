//! Fragment fetch state machine.
//!
//! A fragment performs one upstream fetch (plus at most one fallback fetch)
//! in its own task and streams the wrapped body into a content channel.
//! Async fragments write a placeholder to the main channel immediately and
//! stream their content into a separate deferred channel instead.

use std::sync::Arc;
use std::time::Instant;

use edge_core::{ComposeConfig, RequestId, ResponseHead};
use edge_data::{
    AssetLinks, FetchError, HeaderFilter, TimeoutConfig, UpstreamClient, UpstreamResponse,
};
use edge_observability::{EventSink, FragmentEvent, FragmentEventRecord};
use edge_streaming::{content_channel, ChannelWriter, ContentChannel};
use futures::channel::oneshot;
use futures::StreamExt;
use http::HeaderMap;

use crate::attributes::FragmentAttributes;
use crate::fallback::{Attempt, FallbackPolicy};
use crate::index::IndexRange;
use crate::markers::{EnvelopeSpec, Markers};

/// Lifecycle of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentState {
    Created,
    Fetching,
    Succeeded,
    Failed,
    FallbackFetching,
    FallbackSucceeded,
    FallbackFailed,
}

impl FragmentState {
    /// State after a fetch attempt starts.
    pub fn on_fetch(self) -> Self {
        match self {
            Self::Created => Self::Fetching,
            Self::Failed => Self::FallbackFetching,
            other => other,
        }
    }

    /// State after the current attempt got a usable response.
    pub fn on_response(self) -> Self {
        match self {
            Self::Fetching => Self::Succeeded,
            Self::FallbackFetching => Self::FallbackSucceeded,
            other => other,
        }
    }

    /// State after the current attempt failed.
    pub fn on_error(self) -> Self {
        match self {
            Self::Fetching => Self::Failed,
            Self::FallbackFetching => Self::FallbackFailed,
            other => other,
        }
    }

    /// Check if no further attempt can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FallbackSucceeded | Self::FallbackFailed
        )
    }
}

/// Status and headers of the response a fragment streamed, or why it failed.
pub type FragmentOutcome = Result<ResponseHead, FetchError>;

/// Request-scoped collaborators shared by every fragment of a request.
#[derive(Clone)]
pub struct FetchEnv {
    pub client: UpstreamClient,
    pub headers: Arc<HeaderFilter>,
    /// Headers of the inbound request.
    pub inbound: Arc<HeaderMap>,
    pub config: Arc<ComposeConfig>,
    pub markers: Markers,
    pub sink: Arc<dyn EventSink>,
    pub request_id: RequestId,
}

impl FetchEnv {
    /// Bundle the collaborators for one request.
    pub fn new(
        client: UpstreamClient,
        headers: Arc<HeaderFilter>,
        inbound: Arc<HeaderMap>,
        config: Arc<ComposeConfig>,
        sink: Arc<dyn EventSink>,
        request_id: RequestId,
    ) -> Self {
        let markers = Markers::new(config.pipe_instance_name.clone());
        Self {
            client,
            headers,
            inbound,
            config,
            markers,
            sink,
            request_id,
        }
    }
}

/// Channels a started fragment writes to.
pub struct FragmentHandle {
    /// In-place content, or just the placeholder for async fragments.
    pub main: ContentChannel,
    /// Content for the end of the document (async fragments only).
    pub deferred: Option<ContentChannel>,
    /// Resolved once the fragment has a response or has failed for good.
    pub outcome: oneshot::Receiver<FragmentOutcome>,
}

struct Reporter {
    sink: Arc<dyn EventSink>,
    request_id: RequestId,
    fragment_id: String,
    index: usize,
    primary: bool,
    started: Instant,
}

impl Reporter {
    fn emit(&self, url: &str, event: FragmentEvent) {
        self.sink.fragment(&FragmentEventRecord {
            request_id: self.request_id.clone(),
            fragment_id: self.fragment_id.clone(),
            index: self.index,
            url: url.to_string(),
            primary: self.primary,
            elapsed: self.started.elapsed(),
            event,
        });
    }
}

/// One composition tag being resolved.
#[derive(Debug)]
pub struct Fragment {
    attributes: FragmentAttributes,
    index: usize,
    state: FragmentState,
}

impl Fragment {
    /// Create a fragment whose index block starts at `index`.
    pub fn new(attributes: FragmentAttributes, index: usize) -> Self {
        Self {
            attributes,
            index,
            state: FragmentState::Created,
        }
    }

    pub fn attributes(&self) -> &FragmentAttributes {
        &self.attributes
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> FragmentState {
        self.state
    }

    /// Start fetching in a new task and return the fragment's channels.
    ///
    /// Must be called inside a tokio runtime.
    pub fn fetch(self, env: FetchEnv) -> FragmentHandle {
        let (main_writer, main) = content_channel();
        let (outcome_tx, outcome) = oneshot::channel();

        let (writer, deferred) = if self.attributes.is_async {
            main_writer.write_str(&env.markers.placeholder(self.index));
            drop(main_writer);
            let (deferred_writer, deferred) = content_channel();
            (deferred_writer, Some(deferred))
        } else {
            (main_writer, None)
        };

        tokio::spawn(self.run(env, writer, outcome_tx));

        FragmentHandle {
            main,
            deferred,
            outcome,
        }
    }

    fn transition(&mut self, next: FragmentState) {
        if next != self.state {
            tracing::trace!(fragment = %self.attributes.id, from = ?self.state, to = ?next, "Fragment state");
            self.state = next;
        }
    }

    async fn run(
        mut self,
        env: FetchEnv,
        writer: ChannelWriter,
        outcome: oneshot::Sender<FragmentOutcome>,
    ) {
        let reporter = Reporter {
            sink: env.sink.clone(),
            request_id: env.request_id.clone(),
            fragment_id: self.attributes.id.clone(),
            index: self.index,
            primary: self.attributes.primary,
            started: Instant::now(),
        };
        let headers = env.headers.filter(&env.inbound, self.attributes.public);
        let timeout = TimeoutConfig::uniform(self.attributes.timeout);

        let mut attempt = Attempt::Primary;
        let mut url = self.attributes.url.clone();
        reporter.emit(url.as_deref().unwrap_or_default(), FragmentEvent::Start);

        loop {
            self.transition(self.state.on_fetch());
            let label = url.clone().unwrap_or_default();

            let result = match url.as_deref() {
                Some(target) => env.client.get(target, headers.clone(), timeout).await,
                None => Err(FetchError::MissingSource),
            };

            let error = match result {
                Ok(response) => {
                    self.transition(self.state.on_response());
                    if attempt == Attempt::Fallback {
                        reporter.emit(&label, FragmentEvent::Fallback);
                    }
                    self.stream(&env, &reporter, &label, response, writer, outcome)
                        .await;
                    return;
                }
                Err(error) => error,
            };

            if error.is_timeout() {
                reporter.emit(&label, FragmentEvent::Timeout);
            }
            self.transition(self.state.on_error());

            let next = FallbackPolicy
                .next(attempt, &error, self.attributes.fallback_url.as_deref())
                .map(str::to_string);
            match next {
                Some(next) => {
                    attempt = Attempt::Fallback;
                    url = Some(next);
                }
                None => {
                    reporter.emit(
                        &label,
                        FragmentEvent::Error {
                            error: error.to_string(),
                        },
                    );
                    let _ = outcome.send(Err(error));
                    return;
                }
            }
        }
    }

    async fn stream(
        &self,
        env: &FetchEnv,
        reporter: &Reporter,
        url: &str,
        response: UpstreamResponse,
        writer: ChannelWriter,
        outcome: oneshot::Sender<FragmentOutcome>,
    ) {
        let UpstreamResponse {
            status,
            headers,
            mut body,
        } = response;

        reporter.emit(
            url,
            FragmentEvent::Response {
                status,
                headers: headers.clone(),
            },
        );

        let assets = AssetLinks::from_headers(
            &headers,
            &env.config.asset_link_headers,
            env.config.max_asset_links,
        );
        let _ = outcome.send(Ok(ResponseHead { status, headers }));

        let envelope = env.markers.envelope(&EnvelopeSpec {
            id: &self.attributes.id,
            range: IndexRange::new(self.index, assets.scripts.len()),
            stylesheets: &assets.stylesheets,
            scripts: &assets.scripts,
            primary: self.attributes.primary,
            deferred: self.attributes.is_async,
            inline: self.attributes.inline,
        });

        writer.write_str(&envelope.prefix);
        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => {
                    bytes += chunk.len() as u64;
                    if !writer.write(chunk) {
                        tracing::debug!(fragment = %self.attributes.id, "Fragment output dropped, abandoning body");
                        return;
                    }
                }
                Err(error) => {
                    if error.is_timeout() {
                        reporter.emit(url, FragmentEvent::Timeout);
                    }
                    reporter.emit(
                        url,
                        FragmentEvent::Error {
                            error: error.to_string(),
                        },
                    );
                    writer.write_str(&envelope.suffix);
                    return;
                }
            }
        }
        writer.write_str(&envelope.suffix);
        reporter.emit(url, FragmentEvent::End { bytes });
    }
}
