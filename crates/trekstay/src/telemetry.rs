//! Tracing setup for the booking service.
//!
//! A `RUST_LOG` directive set in the environment wins outright; otherwise the
//! configured `APP_LOG_LEVEL` seeds the filter. Output is compact single-line
//! text without ANSI color so request logs survive capture by whatever runs
//! the process.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber could not be installed: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|source| {
            TelemetryError::Filter {
                value: config.log_level.clone(),
                source,
            }
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_filter_is_reported() {
        std::env::remove_var("RUST_LOG");
        let config = TelemetryConfig {
            log_level: "info=debug=trace".to_string(),
        };
        match init(&config) {
            Err(TelemetryError::Filter { value, .. }) => {
                assert_eq!(value, "info=debug=trace")
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }
}
