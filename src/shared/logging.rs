//! Tracing subscriber setup for the binary

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`
pub const LOG_ENV: &str = "SWARM_LOG";

const DEFAULT_LEVEL: &str = "info";

/// Log output options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// One JSON object per line instead of human-readable text
    pub json:  bool,
    /// Directive used when neither `SWARM_LOG` nor `RUST_LOG` is set
    pub level: Option<String>
}

/// Resolve the filter directive: `SWARM_LOG`, then `RUST_LOG`, then the fallback
pub fn filter_directive(fallback: Option<&str>) -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.unwrap_or(DEFAULT_LEVEL).to_string())
}

/// Initialize tracing subscriber for logging; logs go to stderr
pub fn init_logging(options: &LogOptions) -> Result<()> {
    let directive = filter_directive(options.level.as_deref());
    let filter = EnvFilter::try_new(&directive).with_context(|| format!("Invalid log filter '{}'", directive))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if options.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.compact().try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}
