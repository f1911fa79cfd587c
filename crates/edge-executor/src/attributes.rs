//! Fragment attribute resolution.

use std::time::Duration;

use edge_core::{ComposeConfig, CompositionContext, Token};

/// Attribute names understood on the composition tag.
pub mod names {
    pub const SRC: &str = "src";
    pub const FALLBACK_SRC: &str = "fallback-src";
    pub const ID: &str = "id";
    pub const TIMEOUT: &str = "timeout";
    pub const ASYNC: &str = "async";
    pub const INLINE: &str = "inline";
    pub const PRIMARY: &str = "primary";
    pub const PUBLIC: &str = "public";
}

/// Resolved settings for one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentAttributes {
    pub id: String,
    pub url: Option<String>,
    pub fallback_url: Option<String>,
    pub timeout: Duration,
    pub is_async: bool,
    pub inline: bool,
    pub primary: bool,
    pub public: bool,
}

/// A flag is set when present with any value other than `false`.
fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().eq_ignore_ascii_case("false"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn lookup<'a>(
    token: &'a Token,
    context: &'a CompositionContext,
    tag_id: Option<&str>,
    name: &str,
) -> Option<&'a str> {
    context.lookup(tag_id, name, token.attribute(name))
}

impl FragmentAttributes {
    /// Resolve the attributes of a composition tag.
    ///
    /// Each attribute comes from the context's request-wide overrides, then
    /// the context's overrides for the tag's id, then the tag itself.
    pub fn resolve(token: &Token, context: &CompositionContext, config: &ComposeConfig) -> Self {
        let tag_id = token.attribute(names::ID);
        let get = |name| lookup(token, context, tag_id, name);

        let id = non_empty(get(names::ID)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let timeout = match get(names::TIMEOUT).map(str::trim) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    tracing::debug!(fragment = %id, timeout = raw, "Ignoring invalid fragment timeout");
                    config.default_timeout()
                }
            },
            None => config.default_timeout(),
        };

        Self {
            url: non_empty(get(names::SRC)),
            fallback_url: non_empty(get(names::FALLBACK_SRC)),
            timeout,
            is_async: flag(get(names::ASYNC)) && !context.force_sync,
            inline: flag(get(names::INLINE)),
            primary: flag(get(names::PRIMARY)),
            public: flag(get(names::PUBLIC)),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{Attribute, AttributeOverrides};

    fn tag(attrs: &[(&str, &str)]) -> Token {
        Token::OpenTag {
            name: "fragment".to_string(),
            attributes: attrs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect(),
            self_closing: false,
        }
    }

    #[test]
    fn test_defaults() {
        let attrs = FragmentAttributes::resolve(
            &tag(&[("src", "http://a/")]),
            &CompositionContext::default(),
            &ComposeConfig::default(),
        );
        assert_eq!(attrs.url.as_deref(), Some("http://a/"));
        assert_eq!(attrs.timeout, Duration::from_millis(10_000));
        assert!(!attrs.is_async && !attrs.inline && !attrs.primary && !attrs.public);
        assert_eq!(attrs.id.len(), 36);
    }

    #[test]
    fn test_flags_and_timeout() {
        let attrs = FragmentAttributes::resolve(
            &tag(&[
                ("src", "http://a/"),
                ("id", "hero"),
                ("async", ""),
                ("primary", "true"),
                ("inline", "false"),
                ("timeout", "250"),
                ("fallback-src", "http://b/"),
            ]),
            &CompositionContext::default(),
            &ComposeConfig::default(),
        );
        assert_eq!(attrs.id, "hero");
        assert!(attrs.is_async && attrs.primary && !attrs.inline);
        assert_eq!(attrs.timeout, Duration::from_millis(250));
        assert_eq!(attrs.fallback_url.as_deref(), Some("http://b/"));
    }

    #[test]
    fn test_bad_timeout_uses_default() {
        let attrs = FragmentAttributes::resolve(
            &tag(&[("timeout", "soon")]),
            &CompositionContext::default(),
            &ComposeConfig::default(),
        );
        assert_eq!(attrs.timeout, Duration::from_millis(10_000));
        assert!(attrs.url.is_none());
    }

    #[test]
    fn test_override_precedence() {
        let mut by_id = AttributeOverrides::new();
        by_id.insert("src".to_string(), "http://by-id/".to_string());
        by_id.insert("timeout".to_string(), "5".to_string());
        let context = CompositionContext::new()
            .with_fragment("hero", by_id)
            .with_override("timeout", "7");

        let attrs = FragmentAttributes::resolve(
            &tag(&[("id", "hero"), ("src", "http://tag/"), ("timeout", "3")]),
            &context,
            &ComposeConfig::default(),
        );
        assert_eq!(attrs.url.as_deref(), Some("http://by-id/"));
        assert_eq!(attrs.timeout, Duration::from_millis(7));
    }

    #[test]
    fn test_force_sync_clears_async() {
        let attrs = FragmentAttributes::resolve(
            &tag(&[("async", "")]),
            &CompositionContext::new().forcing_sync(),
            &ComposeConfig::default(),
        );
        assert!(!attrs.is_async);
    }
}
