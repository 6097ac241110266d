//! The broadcast hub: subscription lifecycle and channel multiplexing.
//!
//! One WebSocket session fans out into per-channel coalescing pipelines.
//! `session` drives the registry from inbound commands; `pipeline` batches
//! the live feeds; `dispatcher` serializes every write onto the session's
//! single socket.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod session;
