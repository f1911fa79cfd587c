//! Request-scoped identity and composition context.

use std::collections::HashMap;

use http::{HeaderMap, StatusCode};

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reuse the inbound `x-request-id` header, or generate a fresh one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(Self::from_string)
            .unwrap_or_else(Self::generate)
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute overrides for a single fragment, keyed by attribute name.
pub type AttributeOverrides = HashMap<String, String>;

/// Request-scoped composition context.
///
/// Fragment attributes resolve as: `overrides` > `by_id[fragment id]` >
/// the tag's own attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionContext {
    /// Overrides applied to every fragment in the request.
    pub overrides: AttributeOverrides,
    /// Overrides looked up by fragment id.
    pub by_id: HashMap<String, AttributeOverrides>,
    /// Clear the `async` flag on every fragment.
    pub force_sync: bool,
}

impl CompositionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add overrides for a fragment id.
    pub fn with_fragment(mut self, id: impl Into<String>, overrides: AttributeOverrides) -> Self {
        self.by_id.insert(id.into(), overrides);
        self
    }

    /// Add an override applied to every fragment.
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Force every fragment to render synchronously.
    pub fn forcing_sync(mut self) -> Self {
        self.force_sync = true;
        self
    }

    /// Resolve an attribute for a fragment, honoring override precedence.
    pub fn lookup<'a>(
        &'a self,
        fragment_id: Option<&str>,
        name: &str,
        tag_value: Option<&'a str>,
    ) -> Option<&'a str> {
        if let Some(v) = self.overrides.get(name) {
            return Some(v);
        }
        if let Some(v) = fragment_id
            .and_then(|id| self.by_id.get(id))
            .and_then(|attrs| attrs.get(name))
        {
            return Some(v);
        }
        tag_value
    }
}

/// Status and headers committed to the client before the body streams.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Create a head with no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }
}
