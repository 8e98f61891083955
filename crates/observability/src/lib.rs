//! Tracing and logging setup shared by every binary in the workspace.

/// Initialize process-wide tracing from `config`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LoggingConfig) {
    tracing::init(config);
}

/// Logging configuration (level, output format).
pub mod logging;

/// Tracing subscriber installation (filters, formatters).
pub mod tracing;

pub use logging::{LogFormat, LoggingConfig};
