//! HTTP and MCP facade over the zimage generation service.
//!
//! The binary in `main.rs` and the integration tests both build the app
//! through [`router::build_app_router`].

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mcp;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
