//! Process-wide tracing subscriber for the intake server and the local tools.

use crate::config::{LogFormat, TelemetryConfig};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    InvalidFilter { directive: String, source: ParseError },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter { directive, .. } => {
                write!(f, "log filter '{directive}' does not parse")
            }
            TelemetryError::Install(err) => {
                write!(f, "could not install the tracing subscriber: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

/// A parsable `RUST_LOG` overrides the configured level; a broken one is ignored.
fn resolve_filter(from_env: Option<&str>, configured: &str) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = from_env.and_then(|directive| EnvFilter::try_new(directive).ok()) {
        return Ok(filter);
    }

    EnvFilter::try_new(configured).map_err(|source| TelemetryError::InvalidFilter {
        directive: configured.to_string(),
        source,
    })
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(from_env.as_deref(), &config.log_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    // Full output keeps targets so flow and intake events can be told apart.
    match config.format {
        LogFormat::Compact => builder.with_target(false).compact().try_init(),
        LogFormat::Full => builder.with_target(true).with_thread_ids(true).try_init(),
    }
    .map_err(TelemetryError::Install)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_applies_without_env_override() {
        let filter = resolve_filter(None, "sirepre=debug").expect("filter parses");
        assert_eq!(filter.to_string(), "sirepre=debug");
    }

    #[test]
    fn env_directive_takes_precedence() {
        let filter = resolve_filter(Some("sirepre=trace"), "info").expect("filter parses");
        assert_eq!(filter.to_string(), "sirepre=trace");
    }

    #[test]
    fn broken_env_directive_falls_back_to_configured_level() {
        let filter = resolve_filter(Some("sirepre=loud"), "warn").expect("fallback parses");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn broken_configured_level_is_reported() {
        match resolve_filter(None, "sirepre=loud") {
            Err(TelemetryError::InvalidFilter { directive, .. }) => {
                assert_eq!(directive, "sirepre=loud");
            }
            other => panic!("expected invalid filter, got {other:?}"),
        }
    }
}
