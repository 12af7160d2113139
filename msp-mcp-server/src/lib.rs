//! MSP MCP Server
//!
//! Exposes device-management, PSA and reporting REST APIs to MCP clients.
//! Each configured vendor gets a raw request tool plus bounded introspection
//! tools over its OpenAPI description.

pub mod logging;
pub mod server;
pub mod tools;

pub use server::MspMcpServer;
pub use tools::ToolProvider;
