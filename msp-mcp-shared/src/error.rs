//! Error types for the MSP MCP server

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MspError>;

#[derive(Error, Debug)]
pub enum MspError {
    /// Missing or inconsistent configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status} {status_text}: {body}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl MspError {
    pub fn auth(message: impl Into<String>) -> Self {
        MspError::Auth {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Stable category name reported in tool error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            MspError::Config(_) => "configuration",
            MspError::Auth { .. } => "authentication",
            MspError::Transport(_) => "transport",
            MspError::Api { .. } => "api",
            MspError::SchemaLoad(_) => "schema_load",
            MspError::Validation(_) => "validation",
            MspError::NotFound(_) => "not_found",
            MspError::Json(_) | MspError::Io(_) | MspError::UrlParse(_) => "internal",
        }
    }
}
