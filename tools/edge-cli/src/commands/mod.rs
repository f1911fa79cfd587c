//! CLI command implementations.

pub mod config;
pub mod serve;
pub mod tokens;

use clap::{Args, Subcommand};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides the config file).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Template directory (overrides the config file).
    #[arg(short, long)]
    pub templates: Option<String>,
}

/// Arguments for the tokens command.
#[derive(Args)]
pub struct TokensArgs {
    /// Base template file.
    pub base: String,

    /// Child template merged into the base template's slots.
    #[arg(long)]
    pub child: Option<String>,

    /// Tokenize as a fragment of a document (no runtime or deferred placeholders).
    #[arg(long)]
    pub fragment: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Write a config file with every default filled in.
    Init {
        /// Output file path.
        #[arg(default_value = "gateway.toml")]
        path: String,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}
