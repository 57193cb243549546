//! HTTP API: server, response types, and the SSE event stream.

pub mod events;
pub mod server;
pub mod types;
