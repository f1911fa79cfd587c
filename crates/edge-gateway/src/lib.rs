//! Composition gateway.
//!
//! This crate ties the composition pipeline to HTTP:
//! - `RequestHandler` - Context and template retrieval, composition, head gating
//! - `CompositionResolver` / `TagHandler` - Built-in and custom tag resolution
//! - `TemplateSource` / `ContextSource` - Where templates and contexts come from
//! - `GatewayConfig` - File configuration for the server
//! - `router` / `serve` - The axum front end

mod config;
mod handler;
mod resolver;
mod response;
mod server;
mod sources;

pub use config::*;
pub use handler::*;
pub use resolver::*;
pub use response::*;
pub use server::*;
pub use sources::*;
