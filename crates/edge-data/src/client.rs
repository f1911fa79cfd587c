//! Upstream fetch client with a shared connection pool.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::timeout::{within, TimeoutConfig};

/// Error type for fetch operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Fragment has no source URL")]
    MissingSource,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Body error: {0}")]
    Body(String),
}

impl FetchError {
    /// Check if this error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Connection pool settings shared by every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long an idle pooled socket is kept, in milliseconds.
    pub pool_idle_timeout_ms: u64,
    /// Idle sockets kept per upstream host.
    pub pool_max_idle_per_host: usize,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout_ms: 1000,
            pool_max_idle_per_host: 32,
            connect_timeout_ms: 2000,
        }
    }
}

/// Streamed upstream body.
pub type UpstreamBody = BoxStream<'static, Result<Bytes, FetchError>>;

/// Response from an upstream, body not yet consumed.
pub struct UpstreamResponse {
    /// Response status (always below 500).
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body chunks, each subject to the idle timeout.
    pub body: UpstreamBody,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// HTTP client for fragment upstreams.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    inner: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client with the given pool settings.
    ///
    /// Responses are transparently gunzipped.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .gzip(true)
            .pool_idle_timeout(Duration::from_millis(config.pool_idle_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Issue a GET request.
    ///
    /// Statuses of 500 and above are returned as `FetchError::Http`; the
    /// body of such a response is never read.
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: TimeoutConfig,
    ) -> Result<UpstreamResponse, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let send = self.inner.get(parsed).headers(headers).send();
        let response = within(timeout.response, send)
            .await?
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if status.is_server_error() {
            tracing::debug!(url, status = status.as_u16(), "Upstream server error");
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = response.headers().clone();
        let body = idle_limited(response.bytes_stream().boxed(), timeout.idle);

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Apply an idle timeout to every chunk of a body.
fn idle_limited(
    body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    idle: Duration,
) -> UpstreamBody {
    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match within(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(err))) => Some((Err(FetchError::from_reqwest(err)), None)),
            Ok(None) => None,
            Err(err) => Some((Err(err), None)),
        }
    })
    .boxed()
}
