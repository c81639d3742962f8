//! HTTP API for playback control and SSE event streaming

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
