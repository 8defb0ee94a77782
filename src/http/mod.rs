//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the external API routing, including the streamable-http `/mcp` endpoint and other
//! endpoints.

pub mod handlers;
