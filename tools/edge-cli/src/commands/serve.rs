//! Run the composition gateway.

use anyhow::Result;
use edge_observability::init_logging;

use super::ServeArgs;
use crate::context::Context;

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(templates) = args.templates {
        config.templates.path = ctx.resolve_path(&templates);
    }
    if ctx.output.is_verbose() {
        config.logging.level = "debug".to_string();
    }
    if ctx.output.is_json() {
        config.logging.json = true;
    }

    init_logging(&config.logging);

    ctx.output.header("Edge gateway");
    ctx.output.kv("listen", &config.server.socket_addr()?.to_string());
    ctx.output.kv("templates", &config.templates.path.display().to_string());
    if let Some(base) = &config.templates.base_template {
        ctx.output.kv("base template", base);
    }
    ctx.output.kv("fragment tag", &config.compose.fragment_tag);
    ctx.output.kv("log format", &config.logging.format().to_string());

    edge_gateway::serve(&config).await
}
