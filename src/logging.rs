//! Shared logging utilities.
//!
//! Provides a consistent tracing configuration for hosts embedding the
//! schema layer. All diagnostics emitted by this crate (classification
//! fallbacks, warn-policy conversion side effects, load progress) go
//! through `tracing` and are shaped by this initialization.

use crate::error::{SchemaError, UsageError};

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: u8, quiet: bool) -> crate::error::Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            SchemaError::Usage(UsageError::Configuration {
                message: format!("failed to initialize logging: {e}"),
            })
        })?;

    Ok(())
}
