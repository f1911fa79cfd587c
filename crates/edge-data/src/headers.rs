//! Header names and the upstream header filter.

use http::header::{HeaderMap, HeaderName};

/// Header names used by the gateway.
pub mod header_names {
    /// Request ID for tracing.
    pub const X_REQUEST_ID: &str = "x-request-id";
    /// Asset links stored as object metadata by some static hosts.
    pub const X_AMZ_META_LINK: &str = "x-amz-meta-link";
}

/// Inbound headers forwarded to non-public fragments by default.
pub const DEFAULT_FORWARDED_HEADERS: &[&str] = &["accept-language", "referer", "user-agent"];

/// Selects which inbound request headers reach upstreams.
#[derive(Debug, Clone)]
pub struct HeaderFilter {
    allowed: Vec<HeaderName>,
}

impl HeaderFilter {
    /// Build a filter from header names. Invalid names are skipped.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let allowed = names
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_ref().trim().as_bytes()) {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(header = name.as_ref(), "Ignoring invalid forwarded header name");
                    None
                }
            })
            .collect();
        Self { allowed }
    }

    /// Headers to send upstream. Public fragments receive none.
    pub fn filter(&self, inbound: &HeaderMap, public: bool) -> HeaderMap {
        let mut outbound = HeaderMap::new();
        if public {
            return outbound;
        }
        for name in &self.allowed {
            for value in inbound.get_all(name) {
                outbound.append(name.clone(), value.clone());
            }
        }
        outbound
    }
}

impl Default for HeaderFilter {
    fn default() -> Self {
        Self::from_names(DEFAULT_FORWARDED_HEADERS)
    }
}
