//! Logging setup. Everything goes to stderr; stdout carries the MCP transport.

use msp_mcp_shared::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over the configured level
pub fn filter_for(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let builder = fmt()
        .with_env_filter(filter_for(logging))
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if logging.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.with_line_number(true).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set global logging subscriber: {e}"))
}

