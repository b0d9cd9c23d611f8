use crate::config::{Environment, LogConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. Call once, at startup.
///
/// Events go to stderr so a `replay` report on stdout stays clean.
pub fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.environment {
        Environment::Production => {
            let json_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_writer(std::io::stderr)
                .with_ansi(false);
            registry.with(json_layer).init();
        }
        Environment::Development => {
            let text_layer = fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            registry.with(text_layer).init();
        }
    }
}
