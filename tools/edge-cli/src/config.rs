//! Config file discovery and writing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use edge_gateway::GatewayConfig;

/// File names searched for when no config path is given.
pub const CONFIG_NAMES: [&str; 3] = ["gateway.toml", "edge.toml", "gateway.json"];

/// Find the nearest config file in `start` or its parents.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Render a config in the format its path implies.
pub fn render(config: &GatewayConfig, path: &Path) -> Result<String> {
    if path.extension().is_some_and(|ext| ext == "json") {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(toml::to_string_pretty(config)?)
    }
}

/// Save a config to a file.
pub fn save(config: &GatewayConfig, path: &Path) -> Result<()> {
    let content = render(config, path)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = render(&GatewayConfig::default(), Path::new("gateway.toml")).unwrap();
        let parsed = GatewayConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.compose.pipe_instance_name, "Pipe");
        assert_eq!(parsed.upstream.forward_headers.len(), 3);
    }

    #[test]
    fn test_find_config_walks_up() {
        let root = std::env::temp_dir().join(format!("edge-cli-{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("edge.toml"), "").unwrap();

        assert_eq!(find_config(&nested), Some(root.join("edge.toml")));
        let _ = std::fs::remove_dir_all(&root);
    }
}
