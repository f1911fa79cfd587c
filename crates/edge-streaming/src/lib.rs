//! Ordered streaming for fragment composition.
//!
//! This crate turns resolved tokens into a single ordered byte stream:
//! - `compose` / `ComposedStream` - Strict-order merge of literals and channels
//! - `TagResolver` / `TagResolution` - How structured tokens become content
//! - `DeferredJoiner` - Whole-fragment, in-order output for async fragments
//! - `InstrumentedBody` - Byte counting and outcome reporting for responses

mod body;
mod channel;
mod engine;
mod joiner;

pub use body::*;
pub use channel::{content_channel, literal_channel, ChannelWriter, ContentChannel};
pub use engine::*;
pub use joiner::*;
