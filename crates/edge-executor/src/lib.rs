//! Fragment execution.
//!
//! This crate resolves composition tags into streamed content:
//! - `Fragment` - Fetch state machine with a single fallback attempt
//! - `FragmentAttributes` - Tag attributes merged with context overrides
//! - `IndexCursor` - Marker index allocation in discovery order
//! - `Markers` - Client-runtime markers around fragment content
//! - `runtime_script` - The client runtime itself

mod attributes;
mod fallback;
mod fragment;
mod index;
mod markers;
mod runtime;

pub use attributes::*;
pub use fallback::*;
pub use fragment::*;
pub use index::*;
pub use markers::*;
pub use runtime::*;
