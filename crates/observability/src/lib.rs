//! Tracing setup and reporting sinks shared by the edge and the dashboard.

/// Initialize process-wide tracing.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Sinks for recovered-but-suspicious client state.
pub mod report;

pub use report::{CorruptionReport, CorruptionSink, TracingReporter};
