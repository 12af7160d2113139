//! Shared types and utilities for the MSP MCP server

pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{Credential, CredentialManager, Token, TokenState, EXPIRY_SAFETY_MARGIN_SECS};
pub use config::{CacheConfig, HttpConfig, LoggingConfig, MspConfig, VendorConfig};
pub use error::{MspError, Result};
pub use types::*;
