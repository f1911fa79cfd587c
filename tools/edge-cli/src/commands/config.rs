//! Configuration management commands.

use std::path::Path;

use anyhow::{bail, Result};
use edge_gateway::GatewayConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{render, save};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { path, force } => init_config(&path, force, ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }
    println!();
    print!("{}", render(&ctx.config, Path::new("gateway.toml"))?);
    Ok(())
}

fn init_config(path: &str, force: bool, ctx: &Context) -> Result<()> {
    let target = ctx.resolve_path(path);
    if target.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    save(&GatewayConfig::default(), &target)?;
    ctx.output.success(&format!("Wrote {}", target.display()));
    Ok(())
}
