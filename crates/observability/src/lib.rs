//! Tracing/logging setup shared by every stockledger process.

/// Initialize process-wide tracing with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use tracing::{LogFormat, ParseLogFormatError};
