use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::app_config::{LogFormat, LoggingConfig};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match config.format {
        LogFormat::Pretty => {
            fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .init();
        }
    }
}
