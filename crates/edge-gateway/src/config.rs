//! Gateway configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use edge_core::ComposeConfig;
use edge_data::{ClientConfig, HeaderFilter, DEFAULT_FORWARDED_HEADERS};
use edge_observability::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Gateway configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Composition settings.
    #[serde(default)]
    pub compose: ComposeConfig,

    /// Upstream client settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Where templates come from.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load config from a file. `.json` files are JSON, everything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Parse TOML config text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Upstream client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Connection pool.
    #[serde(flatten)]
    pub client: ClientConfig,

    /// Inbound headers forwarded to non-public fragments.
    #[serde(default = "default_forward_headers")]
    pub forward_headers: Vec<String>,
}

fn default_forward_headers() -> Vec<String> {
    DEFAULT_FORWARDED_HEADERS.iter().map(|h| h.to_string()).collect()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            forward_headers: default_forward_headers(),
        }
    }
}

impl UpstreamConfig {
    /// Header filter for fragment requests.
    pub fn header_filter(&self) -> HeaderFilter {
        HeaderFilter::from_names(&self.forward_headers)
    }
}

/// Template directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding the templates.
    #[serde(default = "default_templates_path")]
    pub path: PathBuf,

    /// Base template every page is merged into, relative to `path`.
    #[serde(default)]
    pub base_template: Option<String>,

    /// Template file extension.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_templates_path() -> PathBuf {
    PathBuf::from("templates")
}

fn default_extension() -> String {
    "html".to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: default_templates_path(),
            base_template: None,
            extension: default_extension(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.compose.fragment_tag, "fragment");
        assert_eq!(config.compose.max_asset_links, 1);
        assert_eq!(config.upstream.client.pool_idle_timeout_ms, 1000);
        assert_eq!(config.upstream.forward_headers.len(), 3);
        assert_eq!(config.templates.extension, "html");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_parse() {
        let config = GatewayConfig::from_toml(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [compose]
            max_asset_links = 3
            pipe_instance_name = "P"

            [upstream]
            pool_idle_timeout_ms = 500
            forward_headers = ["accept-language"]

            [templates]
            path = "pages"
            base_template = "base.html"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.socket_addr().unwrap().to_string(), "0.0.0.0:9000");
        assert_eq!(config.compose.max_asset_links, 3);
        assert_eq!(config.compose.pipe_instance_name, "P");
        assert_eq!(config.compose.default_timeout_ms, 10_000);
        assert_eq!(config.upstream.client.pool_idle_timeout_ms, 500);
        assert_eq!(config.upstream.client.pool_max_idle_per_host, 32);
        assert_eq!(config.upstream.forward_headers, vec!["accept-language"]);
        assert_eq!(config.templates.path, PathBuf::from("pages"));
        assert_eq!(config.templates.base_template.as_deref(), Some("base.html"));
        assert!(config.logging.json);
    }

    #[test]
    fn test_bad_host_rejected() {
        let server = ServerConfig {
            host: "not an ip".to_string(),
            port: 1,
        };
        assert!(server.socket_addr().is_err());
    }
}
