//! Upstream access for fragment fetches.
//!
//! This crate provides:
//! - `UpstreamClient` - Pooled HTTP client with gzip and per-fetch timeouts
//! - `HeaderFilter` - Which inbound headers reach upstreams
//! - `AssetLinks` - Stylesheet and script links parsed from response headers
//! - `TimeoutConfig` - Response and idle-chunk limits

mod client;
mod headers;
mod links;
mod timeout;

pub use client::*;
pub use headers::*;
pub use links::*;
pub use timeout::*;
