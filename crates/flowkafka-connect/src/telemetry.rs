//! Tracing initialization for the connector runtime

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the configured log
/// level. `RUST_LOG` takes precedence when set; `LogLevel::None` leaves
/// tracing uninitialized entirely.
pub fn init_tracing(level: LogLevel) -> anyhow::Result<()> {
    let Some(directive) = level_directive(level) else {
        return Ok(());
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

fn level_directive(level: LogLevel) -> Option<&'static str> {
    match level {
        LogLevel::None => None,
        LogLevel::Error => Some("error"),
        LogLevel::Warn => Some("warn"),
        LogLevel::Info => Some("info"),
        LogLevel::Debug => Some("debug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directives() {
        assert_eq!(level_directive(LogLevel::None), None);
        assert_eq!(level_directive(LogLevel::Info), Some("info"));
        assert_eq!(level_directive(LogLevel::Debug), Some("debug"));
    }
}
