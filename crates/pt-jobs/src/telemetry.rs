use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("log filter '{directive}' is not a valid tracing directive")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Filter for import runs. A non-empty `RUST_LOG` overrides `APP_LOG_LEVEL`.
fn log_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_level.clone());

    EnvFilter::try_new(&directive).map_err(|source| TelemetryError::Filter { directive, source })
}

/// Row and batch events go to stderr; stdout carries summaries and CSV exports.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = log_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.to_string(),
        }
    }

    #[test]
    fn configured_level_names_the_bad_directive() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let error = log_filter(&config("pt_jobs=loud")).expect_err("invalid directive");
        assert!(matches!(error, TelemetryError::Filter { .. }));
        assert!(error.to_string().contains("pt_jobs=loud"));
    }

    #[test]
    fn module_directives_are_accepted() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = log_filter(&config("warn,pt_jobs::imports=debug")).expect("valid directive");
        assert!(filter.to_string().contains("pt_jobs::imports=debug"));
    }
}
