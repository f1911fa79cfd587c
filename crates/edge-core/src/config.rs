//! Composition configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the template parser, fragments and the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Name of the composition tag.
    #[serde(default = "default_fragment_tag")]
    pub fragment_tag: String,
    /// Additional tags emitted as structured tokens for custom handlers.
    #[serde(default)]
    pub handled_tags: Vec<String>,
    /// The runtime placeholder goes before the first of these tags.
    #[serde(default = "default_insert_before")]
    pub insert_before: Vec<String>,
    /// Maximum asset links retained per relation.
    #[serde(default = "default_max_asset_links")]
    pub max_asset_links: usize,
    /// Global name of the client runtime object.
    #[serde(default = "default_pipe_instance_name")]
    pub pipe_instance_name: String,
    /// Fragment timeout when the tag has none (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Response headers consulted for asset links, in priority order.
    #[serde(default = "default_asset_link_headers")]
    pub asset_link_headers: Vec<String>,
}

fn default_fragment_tag() -> String {
    "fragment".to_string()
}

fn default_insert_before() -> Vec<String> {
    vec!["script".to_string(), "fragment".to_string()]
}

fn default_max_asset_links() -> usize {
    1
}

fn default_pipe_instance_name() -> String {
    "Pipe".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_asset_link_headers() -> Vec<String> {
    vec!["link".to_string(), "x-amz-meta-link".to_string()]
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            fragment_tag: default_fragment_tag(),
            handled_tags: Vec::new(),
            insert_before: default_insert_before(),
            max_asset_links: default_max_asset_links(),
            pipe_instance_name: default_pipe_instance_name(),
            default_timeout_ms: default_timeout_ms(),
            asset_link_headers: default_asset_link_headers(),
        }
    }
}

impl ComposeConfig {
    /// Set the maximum asset links per relation.
    pub fn with_max_asset_links(mut self, max: usize) -> Self {
        self.max_asset_links = max;
        self
    }

    /// Register an additional handled tag.
    pub fn with_handled_tag(mut self, name: impl Into<String>) -> Self {
        self.handled_tags.push(name.into().to_ascii_lowercase());
        self
    }

    /// All tag names the serializer turns into structured tokens.
    pub fn structured_tags(&self) -> Vec<String> {
        let mut tags = vec![self.fragment_tag.to_ascii_lowercase()];
        for tag in &self.handled_tags {
            let tag = tag.to_ascii_lowercase();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    /// Default fragment timeout.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Width of the index block reserved for each fragment.
    pub fn index_width(&self) -> usize {
        self.max_asset_links.max(1)
    }
}
