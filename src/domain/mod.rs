//! Calendar and authorization logic exposed over the MCP protocol

pub mod credentials;
pub mod resources;
pub mod tools;
pub mod utils;
