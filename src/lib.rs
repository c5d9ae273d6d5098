//! hlsgate: an HTTP gateway that proxies HLS streams through itself.
//!
//! Playlists are fetched with per-request forwarding headers and rewritten
//! so every segment, key and init section is fetched back through the
//! gateway with the same headers. Everything else is streamed as-is.

pub mod config;
pub mod error;
pub mod forward;
pub mod gateway;
pub mod hls;
pub mod metrics;
pub mod server;
