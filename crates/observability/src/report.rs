//! Corruption reporting.
//!
//! Client-side state that fails to parse is recovered by the caller (usually
//! by ignoring it); it still has to be reported somewhere an operator can see.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub const IMPERSONATION_TARGET: &str = "printshop::impersonation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionReport {
    /// Stable error code, e.g. `IMPERSONATION_STATE_CORRUPT`.
    pub code: &'static str,
    /// Storage key that held the payload.
    pub key: String,
    pub detail: String,
    pub payload_len: usize,
}

pub trait CorruptionSink: Send + Sync {
    fn report(&self, report: &CorruptionReport);
}

/// Logs at `warn` and keeps a running count.
#[derive(Debug, Default)]
pub struct TracingReporter {
    reported: AtomicU64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl CorruptionSink for TracingReporter {
    fn report(&self, report: &CorruptionReport) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        ::tracing::warn!(
            target: IMPERSONATION_TARGET,
            code = report.code,
            key = %report.key,
            detail = %report.detail,
            payload_len = report.payload_len,
            "discarded corrupt client state"
        );
    }
}
