//! Logging initialization with environment-based formatters
//!
//! - Production: Structured JSON logs for cloud monitoring
//! - Sandbox: Colorful, human-readable logs for development
//!
//! When `LOG_FILE` is set, a plain-text copy of every event is also written
//! to that file, truncated at startup.

use crate::config::get_environment;
use std::fs::File;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging based on the environment
///
/// - Production: JSON structured logs (suitable for log aggregation systems)
/// - Sandbox/Development: Colorful, human-readable logs
pub fn init_logging() {
    let env = get_environment();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let is_production = matches!(env.as_str(), "production" | "prod");

    let stdout_layer = if is_production {
        // Production: Structured JSON logs
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        // Sandbox/Development: Colorful, human-readable logs
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .with_writer(std::io::stdout)
            .boxed()
    };

    let (file_layer, file_error) = match std::env::var("LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => match File::create(path.trim()) {
            Ok(file) => (
                Some(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                ),
                None,
            ),
            Err(e) => (None, Some(format!("{}: {}", path.trim(), e))),
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(error) = file_error {
        tracing::warn!(error = %error, "Failed to open log file, logging to stdout only");
    }
}
