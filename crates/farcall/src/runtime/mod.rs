//! Boa-backed remote execution context.
//!
//! A [`RemoteContext`] is a blank JavaScript global scope populated only by
//! the host prelude and whatever the bootstrap program installs. It is driven
//! in turns: evaluate or deliver, drain the job queue, collect posted
//! messages.

pub mod context;

mod bindings;
mod conversions;
mod job_executor;


pub use bindings::REMOTE_LOG_TARGET;
pub use context::{OutboundPost, RemoteContext, Turn};
