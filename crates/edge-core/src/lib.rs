//! Core data model for the edge composition gateway.
//!
//! This crate provides the types shared by every stage of a composition:
//! - `Token` - One unit of a tokenized template
//! - `ComposeConfig` - Tag names, asset caps and runtime naming
//! - `CompositionContext` - Request-scoped fragment attribute overrides
//! - `ComposePhase` / `TimingContext` - Request lifecycle tracking
//! - Error taxonomy for templates, contexts and composition

mod config;
mod context;
mod error;
mod lifecycle;
mod token;

pub use config::*;
pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use token::*;
