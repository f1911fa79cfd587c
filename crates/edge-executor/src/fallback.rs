//! Fallback policy for failed fragment fetches.

use edge_data::FetchError;

/// Which source a fetch attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Fallback,
}

/// A failed primary fetch gets exactly one retry against the fallback
/// source, when the fragment declares one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPolicy;

impl FallbackPolicy {
    /// Source for the next attempt after `failed` ended with `error`, or
    /// `None` if the fragment has failed for good.
    pub fn next<'a>(
        &self,
        failed: Attempt,
        error: &FetchError,
        fallback_url: Option<&'a str>,
    ) -> Option<&'a str> {
        if failed == Attempt::Fallback {
            return None;
        }
        let url = fallback_url.filter(|url| !url.is_empty())?;
        tracing::debug!(error = %error, fallback = url, "Trying fallback source");
        Some(url)
    }
}
