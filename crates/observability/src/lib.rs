//! Tracing and logging setup shared by Lendora binaries.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(tracing::ObservabilityConfig::from_env());
}

/// Subscriber configuration (filter, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, ObservabilityConfig};
