// Allow complex types where needed for generic retry operations and callbacks
#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod error;
pub mod settings;
pub mod validation;

// Re-export the pieces every adapter touches
pub use adapters::{Capability, HttpAdapter};
pub use error::{
    classify, execute, execute_cancellable, retryable, ErrorHandler, ErrorKind, Failure,
    Presenter, RetryConfig, RetryEngine, RetryError, Severity, StructuredError,
};
pub use settings::{Settings, SettingsLoader};

use settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, else the configured level, else `info`
///
/// `debug` forces the `debug` level for this crate regardless of the other two.
pub fn env_filter(logging: &LoggingSettings, debug: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if !debug {
        return filter;
    }
    match "talking_head_resilience=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(
    logging: &LoggingSettings,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging, debug))
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}


#[cfg(test)]
mod validation_tests;
